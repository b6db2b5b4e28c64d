use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::ClientConfig;
use crate::dispatch::JobListener;
use crate::errors::ClientError;
use crate::notification::Notification;
use crate::orchestrator::{CancellationHandle, StreamOrchestrator, StreamOutcome};
use crate::transport::{HttpJobTransport, JobTransport};

/// Parameters of one process-audio invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessAudioRequest {
    session_id: String,
    num_speakers: Option<u32>,
}

impl ProcessAudioRequest {
    /// Creates a request for the given opaque session id.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            num_speakers: None,
        }
    }

    /// Sets the expected number of speakers.
    pub fn num_speakers(mut self, num_speakers: u32) -> Self {
        self.num_speakers = Some(num_speakers);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn expected_speakers(&self) -> Option<u32> {
        self.num_speakers
    }

    fn validate(&self) -> Result<(), ClientError> {
        if self.session_id.trim().is_empty() {
            return Err(ClientError::Validation(
                "session id must not be empty".into(),
            ));
        }
        if self.num_speakers == Some(0) {
            return Err(ClientError::Validation(
                "num_speakers must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Entry point for starting process-audio streams.
#[derive(Clone)]
pub struct JobClient {
    transport: Arc<dyn JobTransport>,
}

impl JobClient {
    /// Creates a client talking HTTP to the configured service.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Ok(Self::with_transport(Arc::new(HttpJobTransport::new(
            config,
        )?)))
    }

    /// Creates an HTTP client from `ClientConfig::from_env`.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Creates a client over any transport (e.g. an in-memory one in tests).
    pub fn with_transport(transport: Arc<dyn JobTransport>) -> Self {
        Self { transport }
    }

    /// Starts a stream and returns a handle yielding notifications in order.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn process_audio(&self, request: ProcessAudioRequest) -> Result<JobStream, ClientError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let session_id = request.session_id.clone();
        // The sender must not outlive the task, or `rx` would never close.
        let (cancel, _task) = self.spawn(request, tx, |outcome| outcome.cancelled)?;
        Ok(JobStream {
            session_id,
            rx,
            cancel,
            saw_terminal: false,
        })
    }

    /// Starts a stream that reports to `listener`.
    ///
    /// The join handle resolves once the invocation is terminated and returns
    /// the listener. Must be called from within a Tokio runtime.
    pub fn process_audio_with_listener<L>(
        &self,
        request: ProcessAudioRequest,
        listener: L,
    ) -> Result<(CancellationHandle, JoinHandle<StreamOutcome<L>>), ClientError>
    where
        L: JobListener + 'static,
    {
        self.spawn(request, listener, |outcome| outcome)
    }

    fn spawn<L, T, F>(
        &self,
        request: ProcessAudioRequest,
        listener: L,
        finish: F,
    ) -> Result<(CancellationHandle, JoinHandle<T>), ClientError>
    where
        L: JobListener + 'static,
        T: Send + 'static,
        F: FnOnce(StreamOutcome<L>) -> T + Send + 'static,
    {
        request.validate()?;
        let (cancel, cancel_rx) = CancellationHandle::pair();
        let orchestrator = StreamOrchestrator::new(listener, cancel_rx);
        debug!(
            invocation_id = %orchestrator.invocation_id(),
            session_id = request.session_id(),
            "spawning process-audio stream"
        );
        let transport = self.transport.clone();
        let task = tokio::spawn(async move {
            finish(orchestrator.run(transport.as_ref(), &request).await)
        });
        Ok((cancel, task))
    }
}

/// Channel-backed handle for one running invocation.
///
/// Dropping the handle releases the stream, interrupting any pending read.
pub struct JobStream {
    session_id: String,
    rx: mpsc::UnboundedReceiver<Notification>,
    cancel: CancellationHandle,
    saw_terminal: bool,
}

impl JobStream {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns a handle that can cancel the invocation from elsewhere.
    pub fn cancel_handle(&self) -> CancellationHandle {
        self.cancel.clone()
    }

    /// Requests cancellation. No further notifications are produced for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the next notification.
    ///
    /// Returns `None` once the invocation has terminated and every
    /// notification was consumed.
    pub async fn next_notification(&mut self) -> Option<Notification> {
        if self.saw_terminal {
            return None;
        }
        let notification = self.rx.recv().await;
        if notification.as_ref().is_some_and(Notification::is_terminal) {
            self.saw_terminal = true;
        }
        notification
    }

    /// Drains remaining notifications and returns the terminal one.
    ///
    /// Returns `None` if the invocation was cancelled before terminating.
    pub async fn finish(mut self) -> Option<Notification> {
        let mut terminal = None;
        while let Some(notification) = self.next_notification().await {
            if notification.is_terminal() {
                terminal = Some(notification);
            }
        }
        terminal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StreamError;
    use crate::test_utils::MemoryTransport;
    use std::time::Duration;

    const PROGRESS: &str = "event: progress\ndata: {\"chunkIndex\":1,\"totalChunks\":2}\n\n";

    fn client(transport: &MemoryTransport) -> JobClient {
        JobClient::with_transport(Arc::new(transport.clone()))
    }

    #[tokio::test]
    async fn stream_yields_notifications_then_none() {
        let transport = MemoryTransport::chunks([
            PROGRESS,
            "event: segment\ndata: {\"text\":\"We enter the crypt.\",\"startTime\":0,\"endTime\":2.5}\n\n",
            "event: done\ndata: {\"segmentCount\":1}\n\n",
        ]);
        let mut stream = client(&transport)
            .process_audio(ProcessAudioRequest::new("12").num_speakers(4))
            .expect("start");
        assert_eq!(stream.session_id(), "12");

        let mut seen = Vec::new();
        while let Some(notification) = stream.next_notification().await {
            seen.push(notification);
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], Notification::Done { segment_count: 1 });
        assert_eq!(stream.next_notification().await, None);
    }

    #[tokio::test]
    async fn finish_returns_terminal_failure() {
        let transport = MemoryTransport::failing(StreamError::http(409, "Session already processing"));
        let stream = client(&transport)
            .process_audio(ProcessAudioRequest::new("3"))
            .expect("start");
        assert_eq!(
            stream.finish().await,
            Some(Notification::Failure {
                message: "Session already processing".into()
            })
        );
    }

    #[tokio::test]
    async fn cancelled_stream_finishes_without_terminal() {
        let transport = MemoryTransport::chunks([PROGRESS]).then_hang();
        let mut stream = client(&transport)
            .process_audio(ProcessAudioRequest::new("3"))
            .expect("start");
        assert!(matches!(
            stream.next_notification().await,
            Some(Notification::Progress { .. })
        ));
        stream.cancel();
        let finished = tokio::time::timeout(Duration::from_secs(2), stream.finish())
            .await
            .expect("cancelled stream should close");
        assert_eq!(finished, None);
        assert_eq!(transport.closes(), 1);
    }

    #[tokio::test]
    async fn listener_is_returned_with_outcome() {
        let transport = MemoryTransport::chunks([PROGRESS]);
        let (cancel, task) = client(&transport)
            .process_audio_with_listener(ProcessAudioRequest::new("8"), Vec::<Notification>::new())
            .expect("start");
        let outcome = task.await.expect("join");
        assert!(!outcome.cancelled);
        assert_eq!(
            outcome.listener.last(),
            Some(&Notification::Done { segment_count: 0 })
        );
        cancel.cancel();
        assert_eq!(outcome.listener.len(), 2);
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected_before_spawning() {
        let transport = MemoryTransport::chunks([PROGRESS]);
        let client = client(&transport);
        assert!(matches!(
            client.process_audio(ProcessAudioRequest::new("  ")),
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            client.process_audio(ProcessAudioRequest::new("1").num_speakers(0)),
            Err(ClientError::Validation(_))
        ));
        assert_eq!(transport.opens(), 0);
    }
}
