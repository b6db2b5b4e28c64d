use std::time::Duration;

use crate::errors::ClientError;

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";

const ENV_API_URL: &str = "AUDIO_JOB_API_URL";
const ENV_CONNECT_TIMEOUT: &str = "AUDIO_JOB_CONNECT_TIMEOUT_SECS";
const ENV_TIMEOUT: &str = "AUDIO_JOB_TIMEOUT_SECS";

/// Configuration for the job service HTTP client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// API root, e.g. `http://localhost:8000/api`.
    pub base_url: String,
    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,
    /// Optional timeout for the whole request, body included.
    ///
    /// Unset by default because processing a recording can take many minutes.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientConfig {
    /// Creates a config for the given API root.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(10),
            timeout: None,
        }
    }

    /// Builds a config from the environment, loading `.env` first if present.
    ///
    /// Environment variables:
    /// - `AUDIO_JOB_API_URL`: API root (default [`DEFAULT_BASE_URL`]).
    /// - `AUDIO_JOB_CONNECT_TIMEOUT_SECS`: connect timeout in seconds.
    /// - `AUDIO_JOB_TIMEOUT_SECS`: overall request timeout in seconds.
    pub fn from_env() -> Result<Self, ClientError> {
        let _ = dotenvy::dotenv();
        let mut config = match std::env::var(ENV_API_URL) {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::default(),
        };
        if let Some(secs) = read_secs(ENV_CONNECT_TIMEOUT)? {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = read_secs(ENV_TIMEOUT)? {
            config.timeout = Some(Duration::from_secs(secs));
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the API root.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets an overall request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        let url = self.parse_base_url()?;
        if url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "base_url `{}` cannot be used as an API root",
                self.base_url
            )));
        }
        Ok(())
    }

    /// URL of the process-audio endpoint for one session.
    pub fn process_audio_url(&self, session_id: &str) -> Result<reqwest::Url, ClientError> {
        let mut url = self.parse_base_url()?;
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::Config(format!(
                    "base_url `{}` cannot be used as an API root",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["sessions", session_id, "process-audio"]);
        Ok(url)
    }

    fn parse_base_url(&self) -> Result<reqwest::Url, ClientError> {
        reqwest::Url::parse(self.base_url.trim())
            .map_err(|e| ClientError::Config(format!("invalid base_url `{}`: {e}", self.base_url)))
    }
}

fn read_secs(key: &str) -> Result<Option<u64>, ClientError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ClientError::Config(format!("invalid {key} `{raw}`: {e}"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_audio_url_appends_encoded_session_segment() {
        let config = ClientConfig::new("http://localhost:8000/api/");
        let url = config.process_audio_url("42").expect("url");
        assert_eq!(url.as_str(), "http://localhost:8000/api/sessions/42/process-audio");

        let url = config.process_audio_url("a b/c").expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/sessions/a%20b%2Fc/process-audio"
        );
    }

    #[test]
    fn invalid_base_urls_are_config_errors() {
        assert!(matches!(
            ClientConfig::new("not a url").validate(),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::new("mailto:ops@example.com").validate(),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn builder_setters_override_defaults() {
        let config = ClientConfig::default()
            .base_url("http://jobs.internal/api")
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(600));
        assert_eq!(config.base_url, "http://jobs.internal/api");
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.timeout, Some(Duration::from_secs(600)));
        assert_eq!(ClientConfig::default().timeout, None);
    }
}
