//! Streaming client for long-running audio processing jobs.
//!
//! A process-audio request answers with an `event:`/`data:` text stream. This
//! crate decodes that stream incrementally and turns it into typed
//! [`Notification`]s while the transfer is still in flight, delivering exactly
//! one terminal `Done`/`Failure` per invocation unless the caller cancels.
//!
//! # Usage
//!
//! ```no_run
//! use audio_job_client::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = JobClient::new(ClientConfig::new("http://localhost:8000/api"))?;
//! let mut stream = client.process_audio(ProcessAudioRequest::new("42").num_speakers(5))?;
//!
//! while let Some(notification) = stream.next_notification().await {
//!     match notification {
//!         Notification::Progress { chunk_index, total_chunks } => {
//!             println!("chunk {chunk_index}/{total_chunks}")
//!         }
//!         Notification::Segment { text, .. } => println!("{text}"),
//!         Notification::Done { segment_count } => println!("{segment_count} segments"),
//!         Notification::Failure { message } => eprintln!("failed: {message}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Client entry point, request parameters, and the channel stream handle.
pub mod client;
/// HTTP client configuration.
pub mod config;
/// Incremental UTF-8 decoding of body chunks.
pub mod decoder;
/// Frame-to-notification dispatch and the listener interface.
pub mod dispatch;
/// Public error types.
pub mod errors;
/// Frame assembly from decoded text.
pub mod frame;
/// Notification values delivered to callers.
pub mod notification;
/// Logging setup.
pub mod observability;
/// Stream state machine and cancellation.
pub mod orchestrator;
/// Common imports for typical usage.
pub mod prelude;
/// Transport seams and the HTTP implementation.
pub mod transport;

/// In-memory transports for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::{JobClient, JobStream, ProcessAudioRequest};
pub use config::ClientConfig;
pub use decoder::ChunkDecoder;
pub use dispatch::{EventDispatcher, JobListener};
pub use errors::{ClientError, StreamError};
pub use frame::{Frame, FrameAssembler};
pub use notification::{FrameMappingError, Notification};
pub use observability::init_observability;
pub use orchestrator::{
    CancellationHandle, StreamOrchestrator, StreamOutcome, StreamPhase,
};
pub use transport::{ChunkSource, HttpChunkSource, HttpJobTransport, JobTransport};
