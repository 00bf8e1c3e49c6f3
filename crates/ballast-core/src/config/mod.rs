//! Runtime configuration consumed by the sync engine and scheduler.
//!
//! All values are supplied by the host; nothing here is negotiated with the
//! remote service.

use std::time::Duration;

use crate::store::DEFAULT_QUEUE_PAGE_SIZE;
use crate::util::{is_http_url, normalize_text_option};

/// Default scheduler poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(120);

/// Remote sync configuration.
///
/// An absent `api_base_url` means offline-only operation, which is a normal
/// mode rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Base URL of the service exposing `/v1/mass`
    pub api_base_url: Option<String>,
    /// Intents drained per run
    pub page_size: usize,
    /// Scheduler timer period
    pub poll_interval: Duration,
    /// Skip runs without a bearer token instead of calling anonymously
    pub require_auth: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            page_size: DEFAULT_QUEUE_PAGE_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            require_auth: false,
        }
    }
}

impl SyncConfig {
    /// Offline configuration with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the remote base URL. Blank values clear it.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = normalize_text_option(Some(url.into()));
        self
    }

    /// Set the queue page size (at least one intent per run).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_require_auth(mut self, require_auth: bool) -> Self {
        self.require_auth = require_auth;
        self
    }

    /// Check if a remote endpoint is configured
    pub const fn is_configured(&self) -> bool {
        self.api_base_url.is_some()
    }

    /// Validate values that would otherwise fail later at request time.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(url) = &self.api_base_url {
            if !is_http_url(url) {
                return Err(format!("api_base_url must include http:// or https://: {url}"));
            }
        }
        if self.poll_interval.is_zero() {
            return Err("poll interval must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_offline() {
        let config = SyncConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.page_size, 25);
        assert_eq!(config.poll_interval, Duration::from_secs(120));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn blank_base_url_stays_offline() {
        let config = SyncConfig::new().with_api_base_url("   ");
        assert!(!config.is_configured());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let config = SyncConfig::new().with_api_base_url("api.example.com");
        assert!(config.validate().is_err());

        let config = SyncConfig::new().with_poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn page_size_is_at_least_one() {
        assert_eq!(SyncConfig::new().with_page_size(0).page_size, 1);
    }
}
