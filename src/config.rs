//! Configuration types for the conversion client.
//!
//! All client behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to share configs across tasks, log them, and diff two runs to understand
//! why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A many-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::ConvertError;
use crate::observer::ObserverHandle;
use std::fmt;

/// Default service endpoint, matching the backend's development address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8001";

/// Configuration for a [`crate::engine::TransferEngine`].
///
/// Built via [`ClientConfig::builder()`] or [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use mdstream::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://conversion.internal:8001")
///     .status_cadence(25)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the conversion service. Default: `http://localhost:8001`.
    pub base_url: String,

    /// Overall timeout for batch requests and stream connection, in seconds.
    /// Default: 300.
    ///
    /// Batch conversion of a large document can take minutes on the remote
    /// side; a short timeout here would abort otherwise-healthy transfers.
    /// Streaming reads are not bounded by this value once the response has
    /// started — a stalled stream surfaces as a transport error from the
    /// connection itself.
    pub request_timeout_secs: u64,

    /// Timeout for the liveness probe, in seconds. Default: 5.
    ///
    /// The probe is advisory and must fail fast: a hung health check would
    /// block the caller longer than simply attempting the transfer.
    pub health_timeout_secs: u64,

    /// Refresh the human-readable status detail every Nth payload chunk.
    /// Default: 10.
    ///
    /// This is a read-time formatting concern only — counters advance on
    /// every chunk regardless of cadence.
    pub status_cadence: u64,

    /// Observer receiving status and content events. Default: none.
    pub observer: Option<ObserverHandle>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 300,
            health_timeout_secs: 5,
            status_cadence: 10,
            observer: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("health_timeout_secs", &self.health_timeout_secs)
            .field("status_cadence", &self.status_cadence)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn TransferObserver>"))
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        // Trailing slashes would double up when joining endpoint paths.
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn health_timeout_secs(mut self, secs: u64) -> Self {
        self.config.health_timeout_secs = secs.max(1);
        self
    }

    pub fn status_cadence(mut self, every_nth_chunk: u64) -> Self {
        self.config.status_cadence = every_nth_chunk.max(1);
        self
    }

    pub fn observer(mut self, observer: ObserverHandle) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ConvertError> {
        let c = &self.config;
        if !c.base_url.starts_with("http://") && !c.base_url.starts_with("https://") {
            return Err(ConvertError::InvalidConfig(format!(
                "base_url must be an HTTP/HTTPS URL, got '{}'",
                c.base_url
            )));
        }
        if c.status_cadence == 0 {
            return Err(ConvertError::InvalidConfig(
                "status_cadence must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::builder().build().unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.status_cadence, 10);
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let config = ClientConfig::builder()
            .base_url("http://example.com:8001/")
            .build()
            .unwrap();
        assert_eq!(config.base_url, "http://example.com:8001");
    }

    #[test]
    fn non_http_url_is_rejected() {
        let err = ClientConfig::builder()
            .base_url("ftp://example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn cadence_is_clamped_to_one() {
        let config = ClientConfig::builder().status_cadence(0).build().unwrap();
        assert_eq!(config.status_cadence, 1);
    }
}
