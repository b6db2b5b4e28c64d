//! Drives one process-audio invocation from request to terminal notification.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::ProcessAudioRequest;
use crate::decoder::ChunkDecoder;
use crate::dispatch::{EventDispatcher, JobListener};
use crate::errors::StreamError;
use crate::frame::FrameAssembler;
use crate::notification::Notification;
use crate::transport::{ChunkSource, JobTransport};

/// Lifecycle of one invocation. `Terminated` is absorbing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Requesting,
    Streaming,
    Terminated,
}

/// Handle used to cancel a running invocation.
///
/// Cancellation is silent: no notification is delivered for it. Calling
/// `cancel` more than once, or after the invocation ended, has no effect.
#[derive(Clone, Debug)]
pub struct CancellationHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationHandle {
    /// Creates a handle plus the receiver handed to the orchestrator.
    pub fn pair() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Requests cancellation. Never fails.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Mutable state of one invocation, owned by the orchestrator.
pub struct StreamState<L> {
    phase: StreamPhase,
    decoder: ChunkDecoder,
    assembler: FrameAssembler,
    dispatcher: EventDispatcher<L>,
    cancelled: bool,
}

impl<L: JobListener> StreamState<L> {
    fn new(listener: L) -> Self {
        Self {
            phase: StreamPhase::Idle,
            decoder: ChunkDecoder::new(),
            assembler: FrameAssembler::new(),
            dispatcher: EventDispatcher::new(listener),
            cancelled: false,
        }
    }

    fn transition(&mut self, next: StreamPhase) {
        debug!(from = ?self.phase, to = ?next, "stream phase change");
        self.phase = next;
    }

    fn ingest(&mut self, chunk: &[u8]) {
        let text = self.decoder.feed(chunk);
        for frame in self.assembler.push(&text) {
            self.dispatcher.dispatch(frame);
        }
    }

    fn drain(&mut self) {
        let text = self.decoder.flush();
        let mut frames = self.assembler.push(&text);
        frames.extend(self.assembler.finish());
        for frame in frames {
            self.dispatcher.dispatch(frame);
        }
    }

    fn fail(&mut self, err: &StreamError) {
        if self.cancelled || self.dispatcher.terminal_delivered() {
            return;
        }
        self.dispatcher.deliver(Notification::Failure {
            message: err.message().to_string(),
        });
    }
}

/// Result of a finished invocation.
#[derive(Debug)]
pub struct StreamOutcome<L> {
    /// The listener, handed back after the last notification.
    pub listener: L,
    /// Whether the invocation ended through cancellation.
    pub cancelled: bool,
    /// Whether a `Done` or `Failure` was delivered.
    pub terminal_delivered: bool,
    /// Phase the invocation ended in; always `Terminated` once `run` returns.
    pub phase: StreamPhase,
}

enum LoopExit {
    EndOfData,
    Cancelled,
}

/// Runs the request, read loop, and terminal bookkeeping for one invocation.
pub struct StreamOrchestrator<L> {
    invocation_id: uuid::Uuid,
    state: StreamState<L>,
    cancel_rx: watch::Receiver<bool>,
}

impl<L: JobListener> StreamOrchestrator<L> {
    pub fn new(listener: L, cancel_rx: watch::Receiver<bool>) -> Self {
        Self {
            invocation_id: uuid::Uuid::new_v4(),
            state: StreamState::new(listener),
            cancel_rx,
        }
    }

    pub fn invocation_id(&self) -> uuid::Uuid {
        self.invocation_id
    }

    pub fn phase(&self) -> StreamPhase {
        self.state.phase
    }

    /// Drives the invocation to `Terminated`.
    ///
    /// Exactly one `Done` or `Failure` reaches the listener unless the
    /// invocation is cancelled, in which case nothing more is delivered.
    pub async fn run(
        mut self,
        transport: &dyn JobTransport,
        request: &ProcessAudioRequest,
    ) -> StreamOutcome<L> {
        let invocation_id = self.invocation_id;
        let session_id = request.session_id();
        if self.cancel_requested() {
            debug!(%invocation_id, session_id, "cancelled before request");
            return self.terminate();
        }

        self.state.transition(StreamPhase::Requesting);
        let opened = tokio::select! {
            biased;
            _ = wait_for_cancel(&mut self.cancel_rx) => None,
            _ = self.state.dispatcher.listener().closed() => None,
            opened = transport.open(request) => Some(opened),
        };
        let mut source = match opened {
            None => {
                self.state.cancelled = true;
                debug!(%invocation_id, session_id, "cancelled while requesting");
                return self.terminate();
            }
            Some(Err(err)) => {
                // A cancel racing the response still silences the failure.
                self.cancel_requested();
                warn!(%invocation_id, session_id, status = ?err.status(), error = %err, "process-audio request failed");
                self.state.fail(&err);
                return self.terminate();
            }
            Some(Ok(source)) => source,
        };

        self.state.transition(StreamPhase::Streaming);
        let exit = self.read_loop(&mut *source).await;
        source.close();
        drop(source);

        match exit {
            Ok(LoopExit::EndOfData) => {
                self.state.drain();
                if !self.state.dispatcher.terminal_delivered() {
                    info!(%invocation_id, session_id, "stream ended without terminal event");
                    self.state
                        .dispatcher
                        .deliver(Notification::Done { segment_count: 0 });
                }
            }
            Ok(LoopExit::Cancelled) => {
                self.state.cancelled = true;
                debug!(%invocation_id, session_id, "stream cancelled");
            }
            Err(err) => {
                self.cancel_requested();
                warn!(%invocation_id, session_id, error = %err, "stream read failed");
                self.state.fail(&err);
            }
        }
        self.terminate()
    }

    async fn read_loop(&mut self, source: &mut dyn ChunkSource) -> Result<LoopExit, StreamError> {
        loop {
            if self.cancel_requested() {
                return Ok(LoopExit::Cancelled);
            }
            let next = tokio::select! {
                biased;
                _ = wait_for_cancel(&mut self.cancel_rx) => return Ok(LoopExit::Cancelled),
                _ = self.state.dispatcher.listener().closed() => return Ok(LoopExit::Cancelled),
                next = source.next_chunk() => next?,
            };
            let Some(chunk) = next else {
                return Ok(LoopExit::EndOfData);
            };
            self.state.ingest(&chunk);
        }
    }

    /// Checks the cancel flag and the listener; records cancellation in state.
    fn cancel_requested(&mut self) -> bool {
        if *self.cancel_rx.borrow() || self.state.dispatcher.listener().is_closed() {
            self.state.cancelled = true;
        }
        self.state.cancelled
    }

    fn terminate(mut self) -> StreamOutcome<L> {
        self.state.transition(StreamPhase::Terminated);
        let terminal_delivered = self.state.dispatcher.terminal_delivered();
        StreamOutcome {
            cancelled: self.state.cancelled,
            terminal_delivered,
            phase: self.state.phase,
            listener: self.state.dispatcher.into_listener(),
        }
    }
}

/// Resolves once cancellation is requested. A dropped handle never cancels.
async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    let sender_dropped = rx.wait_for(|cancelled| *cancelled).await.is_err();
    if sender_dropped {
        std::future::pending::<()>().await;
    }
}
