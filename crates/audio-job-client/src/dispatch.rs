use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::frame::Frame;
use crate::notification::{FrameMappingError, Notification};

/// Receives notifications for one job invocation.
///
/// Implement the `on_*` callbacks for per-kind handling, or override `notify`
/// to receive every `Notification` value as-is. Calls happen in arrival order
/// on the task driving the stream.
pub trait JobListener: Send {
    /// A chunk of audio finished processing.
    fn on_progress(&mut self, _chunk_index: u64, _total_chunks: u64) {}

    /// A transcript segment was produced.
    fn on_segment(&mut self, _text: &str, _start_time: f64, _end_time: f64) {}

    /// Terminal success.
    fn on_done(&mut self, _segment_count: u64) {}

    /// Terminal failure.
    fn on_error(&mut self, _message: &str) {}

    /// Routes a notification to the matching callback.
    fn notify(&mut self, notification: Notification) {
        match notification {
            Notification::Progress {
                chunk_index,
                total_chunks,
            } => self.on_progress(chunk_index, total_chunks),
            Notification::Segment {
                text,
                start_time,
                end_time,
            } => self.on_segment(&text, start_time, end_time),
            Notification::Done { segment_count } => self.on_done(segment_count),
            Notification::Failure { message } => self.on_error(&message),
        }
    }

    /// Returns `true` once nobody is listening anymore; the stream is then
    /// released as if cancelled.
    fn is_closed(&self) -> bool {
        false
    }

    /// Resolves once the listener becomes closed. Never resolves by default.
    fn closed(&self) -> impl Future<Output = ()> + Send {
        std::future::pending()
    }
}

impl JobListener for mpsc::UnboundedSender<Notification> {
    fn notify(&mut self, notification: Notification) {
        let _ = self.send(notification);
    }

    fn is_closed(&self) -> bool {
        mpsc::UnboundedSender::is_closed(self)
    }

    fn closed(&self) -> impl Future<Output = ()> + Send {
        mpsc::UnboundedSender::closed(self)
    }
}

impl JobListener for Vec<Notification> {
    fn notify(&mut self, notification: Notification) {
        self.push(notification);
    }
}

/// Maps frames to notifications and enforces the single-terminal rule.
pub struct EventDispatcher<L> {
    listener: L,
    terminal_delivered: bool,
}

impl<L: JobListener> EventDispatcher<L> {
    /// Wraps a listener.
    pub fn new(listener: L) -> Self {
        Self {
            listener,
            terminal_delivered: false,
        }
    }

    /// Dispatches one frame. Unrecognized events and bad payloads are dropped.
    pub fn dispatch(&mut self, frame: Frame) {
        match Notification::try_from(frame) {
            Ok(notification) => {
                self.deliver(notification);
            }
            Err(FrameMappingError::UnknownEvent(event)) => {
                debug!(event = %event, "ignoring unrecognized event");
            }
            Err(err) => warn!(error = %err, "dropping frame"),
        }
    }

    /// Delivers a notification unless a terminal one was already delivered.
    ///
    /// Returns whether the listener was called.
    pub fn deliver(&mut self, notification: Notification) -> bool {
        if self.terminal_delivered {
            debug!(?notification, "dropping notification after terminal");
            return false;
        }
        if notification.is_terminal() {
            self.terminal_delivered = true;
        }
        self.listener.notify(notification);
        true
    }

    pub fn terminal_delivered(&self) -> bool {
        self.terminal_delivered
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn into_listener(self) -> L {
        self.listener
    }
}
