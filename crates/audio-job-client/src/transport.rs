//! Narrow transport seams used by the stream orchestrator, plus the
//! reqwest-backed HTTP implementation.

use std::pin::Pin;

use bytes::Bytes;
use futures::StreamExt as _;
use tracing::debug;

use crate::client::ProcessAudioRequest;
use crate::config::ClientConfig;
use crate::errors::{ClientError, StreamError};

/// Chunked reader over a response body.
#[async_trait::async_trait]
pub trait ChunkSource: Send {
    /// Waits for the next chunk. `Ok(None)` means end of data.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError>;

    /// Releases the underlying resource. Further reads return `Ok(None)`.
    fn close(&mut self);
}

/// Issues the triggering request and hands back a body reader.
#[async_trait::async_trait]
pub trait JobTransport: Send + Sync {
    /// Starts the job. Non-success statuses are reported as `StreamError::Http`.
    async fn open(
        &self,
        request: &ProcessAudioRequest,
    ) -> Result<Box<dyn ChunkSource>, StreamError>;
}

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static>>;

/// Body reader over a `reqwest::Response`. Dropping the stream aborts the
/// transfer.
pub struct HttpChunkSource {
    stream: Option<ByteStream>,
}

impl HttpChunkSource {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            stream: Some(Box::pin(response.bytes_stream())),
        }
    }
}

#[async_trait::async_trait]
impl ChunkSource for HttpChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        match stream.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(StreamError::transport(format!(
                "streaming read failed: {e}"
            ))),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("released response body stream");
        }
    }
}

/// `JobTransport` talking to the job service over HTTP.
pub struct HttpJobTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpJobTransport {
    /// Builds the HTTP client from configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl JobTransport for HttpJobTransport {
    async fn open(
        &self,
        request: &ProcessAudioRequest,
    ) -> Result<Box<dyn ChunkSource>, StreamError> {
        let url = self
            .config
            .process_audio_url(request.session_id())
            .map_err(|e| StreamError::transport(e.to_string()))?;
        debug!(%url, num_speakers = ?request.expected_speakers(), "starting process-audio stream");

        let mut http_req = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        if let Some(num_speakers) = request.expected_speakers() {
            http_req = http_req.query(&[("num_speakers", num_speakers)]);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| StreamError::transport(format!("process-audio request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let fallback = status.canonical_reason().unwrap_or("request failed");
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::http(
                status.as_u16(),
                error_message_from_body(&body, fallback),
            ));
        }

        Ok(Box::new(HttpChunkSource::new(response)))
    }
}

/// Extracts the caller-facing message from an error response body.
///
/// A string `detail` is used verbatim, other non-empty values are serialised,
/// and anything else falls back to `fallback`.
pub fn error_message_from_body(body: &str, fallback: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return fallback.to_string();
    };
    match value.get("detail") {
        Some(serde_json::Value::String(detail)) => detail.clone(),
        None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => {
            fallback.to_string()
        }
        Some(serde_json::Value::Number(n)) if n.as_f64() == Some(0.0) => fallback.to_string(),
        Some(other) => other.to_string(),
    }
}
