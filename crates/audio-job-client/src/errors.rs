/// Errors returned by the client API before a stream invocation is started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration (base URL, timeouts, HTTP client setup).
    #[error("config error: {0}")]
    Config(String),
    /// Invalid request passed to the client.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Failures raised inside a stream invocation.
///
/// These never cross the invocation boundary as `Err` values; the orchestrator
/// turns them into a single `Notification::Failure`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Connection failure before or during streaming.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The triggering request returned a non-success status.
    #[error("request failed with status {status}: {message}")]
    Http { status: u16, message: String },
}

impl StreamError {
    /// Creates a transport-level error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an HTTP status error carrying the server-provided detail.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Returns the message delivered to the caller in `Notification::Failure`.
    pub fn message(&self) -> &str {
        match self {
            Self::Transport { message } | Self::Http { message, .. } => message,
        }
    }

    /// Returns the HTTP status for `Http` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_is_the_bare_detail() {
        let err = StreamError::http(404, "Session not found");
        assert_eq!(err.message(), "Session not found");
        assert_eq!(err.status(), Some(404));
        assert_eq!(
            err.to_string(),
            "request failed with status 404: Session not found"
        );

        let err = StreamError::transport("connection reset");
        assert_eq!(err.message(), "connection reset");
        assert_eq!(err.status(), None);
    }
}
