use serde::Deserialize;

use crate::frame::Frame;

/// Typed notifications delivered to the caller during one invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// The server finished processing one audio chunk.
    Progress { chunk_index: u64, total_chunks: u64 },
    /// A partial transcript segment.
    Segment {
        text: String,
        start_time: f64,
        end_time: f64,
    },
    /// Terminal success.
    Done { segment_count: u64 },
    /// Terminal failure.
    Failure { message: String },
}

impl Notification {
    /// Returns `true` for `Done` and `Failure`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Failure { .. })
    }
}

const DEFAULT_FAILURE_MESSAGE: &str = "audio processing failed";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressPayload {
    chunk_index: u64,
    total_chunks: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SegmentPayload {
    text: String,
    start_time: f64,
    end_time: f64,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct DonePayload {
    segment_count: u64,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ErrorPayload {
    message: Option<String>,
}

/// Why a frame did not map to a notification.
#[derive(Debug, thiserror::Error)]
pub enum FrameMappingError {
    #[error("unrecognized event `{0}`")]
    UnknownEvent(String),
    #[error("invalid `{event}` payload: {source}")]
    InvalidPayload {
        event: String,
        source: serde_json::Error,
    },
}

impl TryFrom<Frame> for Notification {
    type Error = FrameMappingError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let Frame { event, payload } = frame;
        let invalid = |event: &str, source: serde_json::Error| FrameMappingError::InvalidPayload {
            event: event.to_string(),
            source,
        };
        match event.as_str() {
            "progress" => {
                let p: ProgressPayload =
                    serde_json::from_value(payload).map_err(|e| invalid(&event, e))?;
                Ok(Self::Progress {
                    chunk_index: p.chunk_index,
                    total_chunks: p.total_chunks,
                })
            }
            "segment" => {
                let p: SegmentPayload =
                    serde_json::from_value(payload).map_err(|e| invalid(&event, e))?;
                Ok(Self::Segment {
                    text: p.text,
                    start_time: p.start_time,
                    end_time: p.end_time,
                })
            }
            // Terminal frames must never be lost to a shape mismatch.
            "done" => {
                let p: DonePayload = serde_json::from_value(payload).unwrap_or_default();
                Ok(Self::Done {
                    segment_count: p.segment_count,
                })
            }
            "error" => {
                let p: ErrorPayload = serde_json::from_value(payload).unwrap_or_default();
                let message = p
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                Ok(Self::Failure { message })
            }
            other => Err(FrameMappingError::UnknownEvent(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(event: &str, payload: serde_json::Value) -> Frame {
        Frame {
            event: event.into(),
            payload,
        }
    }

    #[test]
    fn maps_every_recognized_event() {
        assert_eq!(
            Notification::try_from(frame("progress", json!({"chunkIndex": 1, "totalChunks": 4})))
                .expect("progress"),
            Notification::Progress {
                chunk_index: 1,
                total_chunks: 4
            }
        );
        assert_eq!(
            Notification::try_from(frame(
                "segment",
                json!({"text": "hi", "startTime": 0.5, "endTime": 1})
            ))
            .expect("segment"),
            Notification::Segment {
                text: "hi".into(),
                start_time: 0.5,
                end_time: 1.0
            }
        );
        assert_eq!(
            Notification::try_from(frame("done", json!({"segmentCount": 3}))).expect("done"),
            Notification::Done { segment_count: 3 }
        );
        assert_eq!(
            Notification::try_from(frame("error", json!({"message": "model missing"})))
                .expect("error"),
            Notification::Failure {
                message: "model missing".into()
            }
        );
    }

    #[test]
    fn unknown_event_and_bad_progress_shape_are_rejected() {
        assert!(matches!(
            Notification::try_from(frame("phase", json!({"phase": "x"}))),
            Err(FrameMappingError::UnknownEvent(name)) if name == "phase"
        ));
        assert!(matches!(
            Notification::try_from(frame("progress", json!({"chunkIndex": "one"}))),
            Err(FrameMappingError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn terminal_payloads_are_lenient() {
        assert_eq!(
            Notification::try_from(frame("done", json!(null))).expect("done"),
            Notification::Done { segment_count: 0 }
        );
        let failure = Notification::try_from(frame("error", json!({}))).expect("error");
        assert_eq!(
            failure,
            Notification::Failure {
                message: DEFAULT_FAILURE_MESSAGE.into()
            }
        );
        assert!(failure.is_terminal());
    }
}
