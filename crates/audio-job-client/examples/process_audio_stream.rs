//! Streams process-audio notifications for one session.
//!
//! Usage: `cargo run --example process_audio_stream -- <session-id> [num-speakers]`
//! Press Ctrl-C to cancel the job stream.

use audio_job_client::init_observability;
use audio_job_client::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    init_observability();

    let mut args = std::env::args().skip(1);
    let session_id = args
        .next()
        .ok_or_else(|| ClientError::Validation("usage: process_audio_stream <session-id> [num-speakers]".into()))?;
    let mut request = ProcessAudioRequest::new(session_id);
    if let Some(raw) = args.next() {
        let num_speakers = raw
            .parse()
            .map_err(|e| ClientError::Validation(format!("invalid num-speakers `{raw}`: {e}")))?;
        request = request.num_speakers(num_speakers);
    }

    let client = JobClient::from_env()?;
    let mut stream = client.process_audio(request)?;
    let cancel = stream.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    while let Some(notification) = stream.next_notification().await {
        match notification {
            Notification::Progress {
                chunk_index,
                total_chunks,
            } => eprintln!("processed chunk {chunk_index}/{total_chunks}"),
            Notification::Segment {
                text,
                start_time,
                end_time,
            } => println!("[{start_time:>8.2} - {end_time:>8.2}] {text}"),
            Notification::Done { segment_count } => eprintln!("done: {segment_count} segments"),
            Notification::Failure { message } => eprintln!("failed: {message}"),
        }
    }
    Ok(())
}
