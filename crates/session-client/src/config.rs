//! Client and per-call configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use transport::DEFAULT_CONTENT_TYPE;

/// Envelope code meaning "success".
pub const DEFAULT_SUCCESS_CODE: &str = "0";

/// Envelope code meaning "access token expired".
pub const DEFAULT_EXPIRED_CODE: &str = "14401";

pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Construction-time settings for one client instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_refresh_path")]
    pub refresh_endpoint_path: String,
    /// Emit per-request lifecycle events (sent, duration) at info level.
    #[serde(default)]
    pub logging_enabled: bool,
    /// Minimum spacing between two refresh attempts.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Upper bound on a single refresh call. `None` waits as long as the
    /// transport does.
    #[serde(default)]
    pub refresh_timeout_ms: Option<u64>,
    #[serde(default = "default_success_code")]
    pub success_code: String,
    #[serde(default = "default_expired_code")]
    pub expired_code: String,
    /// Treat HTTP 401 like the expired envelope code.
    #[serde(default)]
    pub expire_on_unauthorized: bool,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_cooldown_ms() -> u64 {
    10_000
}

fn default_success_code() -> String {
    DEFAULT_SUCCESS_CODE.to_string()
}

fn default_expired_code() -> String {
    DEFAULT_EXPIRED_CODE.to_string()
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

impl ClientConfig {
    /// Defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: default_timeout_ms(),
            refresh_endpoint_path: default_refresh_path(),
            logging_enabled: false,
            cooldown_ms: default_cooldown_ms(),
            refresh_timeout_ms: None,
            success_code: default_success_code(),
            expired_code: default_expired_code(),
            expire_on_unauthorized: false,
            content_type: default_content_type(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn refresh_timeout(&self) -> Option<Duration> {
        self.refresh_timeout_ms.map(Duration::from_millis)
    }
}

/// How a caller-visible error should be surfaced to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    #[default]
    Modal,
    Toast,
    Hidden,
}

/// Per-call options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOptions {
    /// Skip envelope unwrapping and return the whole response body.
    /// Credential expiry is still honored.
    #[serde(default)]
    pub return_native_data: bool,
    #[serde(default)]
    pub error_mode: ErrorMode,
    /// Overrides the client-wide timeout for this call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl CallOptions {
    pub fn native() -> Self {
        Self {
            return_native_data: true,
            ..Self::default()
        }
    }

    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url":"https://api.example.com"}"#).unwrap();
        assert_eq!(config, ClientConfig::new("https://api.example.com"));
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.cooldown(), Duration::from_secs(10));
        assert_eq!(config.refresh_timeout(), None);
        assert_eq!(config.success_code, "0");
        assert_eq!(config.expired_code, "14401");
        assert_eq!(config.refresh_endpoint_path, "/auth/refresh");
        assert!(!config.logging_enabled);
    }

    #[test]
    fn error_mode_parses_lowercase() {
        let mode: ErrorMode = serde_json::from_str("\"toast\"").unwrap();
        assert_eq!(mode, ErrorMode::Toast);
        assert_eq!(ErrorMode::default(), ErrorMode::Modal);
    }

    #[test]
    fn call_options_builders() {
        let options = CallOptions::native()
            .with_error_mode(ErrorMode::Hidden)
            .with_timeout(Duration::from_millis(1500));
        assert!(options.return_native_data);
        assert_eq!(options.error_mode, ErrorMode::Hidden);
        assert_eq!(options.timeout(), Some(Duration::from_millis(1500)));
    }
}
