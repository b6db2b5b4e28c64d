//! Line-oriented frame assembly for the `event:`/`data:` job protocol.

use tracing::{debug, warn};

const EVENT_PREFIX: &str = "event:";
const DATA_PREFIX: &str = "data:";

/// One complete event name plus JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub event: String,
    pub payload: serde_json::Value,
}

/// Accumulates decoded text and yields complete frames.
///
/// The sequence of frames produced does not depend on how the text was split
/// across `push` calls.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: String,
    pending_event: Option<String>,
}

impl FrameAssembler {
    /// Creates an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a text fragment and returns the frames completed by it, in order.
    pub fn push(&mut self, fragment: &str) -> Vec<Frame> {
        self.buffer.push_str(fragment);
        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].find('\n') {
            let end = start + offset;
            process_line(
                &self.buffer[start..end],
                &mut self.pending_event,
                &mut frames,
            );
            start = end + 1;
        }
        self.buffer.drain(..start);
        frames
    }

    /// Processes a trailing unterminated line at end of stream and resets state.
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        let line = std::mem::take(&mut self.buffer);
        if !line.is_empty() {
            process_line(&line, &mut self.pending_event, &mut frames);
        }
        self.pending_event = None;
        frames
    }

    /// Text received but not yet terminated by a newline.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Event name waiting for its `data:` line.
    pub fn pending_event(&self) -> Option<&str> {
        self.pending_event.as_deref()
    }
}

fn process_line(raw: &str, pending_event: &mut Option<String>, frames: &mut Vec<Frame>) {
    let line = raw.strip_suffix('\r').unwrap_or(raw);
    if let Some(name) = line.strip_prefix(EVENT_PREFIX) {
        *pending_event = Some(name.trim().to_string());
    } else if let Some(data) = line.strip_prefix(DATA_PREFIX) {
        let Some(event) = pending_event.as_deref() else {
            debug!("ignoring data line without a preceding event name");
            return;
        };
        // The event name survives a bad payload until the next blank line.
        match serde_json::from_str(data.trim()) {
            Err(err) => warn!(event, error = %err, "dropping frame with malformed JSON payload"),
            Ok(payload) => {
                if let Some(event) = pending_event.take() {
                    frames.push(Frame { event, payload });
                }
            }
        }
    } else if line.trim().is_empty() {
        *pending_event = None;
    }
}
