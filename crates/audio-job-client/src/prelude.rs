//! Common imports for typical client usage.

pub use crate::client::{JobClient, JobStream, ProcessAudioRequest};
pub use crate::config::ClientConfig;
pub use crate::dispatch::JobListener;
pub use crate::errors::ClientError;
pub use crate::notification::Notification;
pub use crate::orchestrator::{CancellationHandle, StreamOutcome};
