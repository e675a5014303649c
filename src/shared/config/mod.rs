//! Application configuration module
//!
//! Client-side configuration for a session: where the server lives, how to
//! authenticate, and how often to poll while the live transport is down.

use std::time::Duration;
use thiserror::Error;

/// Default polling interval while degraded
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server URL, e.g. `http://localhost:5000`
    pub server_url: String,
    /// Bearer token presented to the API and the live transport
    pub auth_token: Option<String>,
    /// Reconciliation interval while the transport is disconnected
    pub poll_interval: Duration,
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.server_url)
            .map_err(|_| ConfigError::InvalidUrl(self.server_url.clone()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(self.server_url.clone()));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Base URL of the REST API
    pub fn api_base(&self) -> String {
        format!("{}/api", self.server_url.trim_end_matches('/'))
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    auth_token: Option<String>,
    poll_interval: Option<Duration>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Set the bearer token
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the degraded-mode polling interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let config = AppConfig {
            server_url: self.server_url.ok_or(ConfigError::MissingValue("server_url"))?,
            auth_token: self.auth_token,
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
