//! Backend Configuration
//!
//! Where the backend lives, how long a single request may take, and where
//! native builds keep their log files.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-call client timeout
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8081";
pub const BACKEND_URL_ENV: &str = "SCREENTIME_BACKEND_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub backend_url: String,
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Daily log files go here on native targets; unset keeps logs in memory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            backend_url: option_env!("SCREENTIME_BACKEND_URL")
                .unwrap_or(DEFAULT_BACKEND_URL)
                .to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            log_dir: None,
        }
    }
}

impl ApiConfig {
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Runtime environment first, then the value baked in at build time
    pub fn from_env() -> Self {
        match std::env::var(BACKEND_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::default(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: ApiConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(self.backend_url.trim())
            .map_err(|err| Error::Config(format!("invalid backend url {:?}: {}", self.backend_url, err)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "backend url must use http or https, got {:?}",
                self.backend_url
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(Error::Config(format!("backend url has no host: {:?}", self.backend_url)));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::Config("request timeout must be positive".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.backend_url.trim().trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_defaults_timeout() {
        let config = ApiConfig::from_json(r#"{"backendUrl": "https://api.example.com/"}"#).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.base_url(), "https://api.example.com");
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(matches!(
            ApiConfig::from_json(r#"{"backendUrl": "ftp://x"}"#),
            Err(Error::Config(_))
        ));
        assert!(ApiConfig::new("http://x").with_timeout(Duration::ZERO).validate().is_err());
    }

    #[test]
    fn test_rejects_url_without_host() {
        for url in ["http://", "https:// bad host", "http://exa mple.com", "localhost:8081"] {
            assert!(
                matches!(ApiConfig::new(url).validate(), Err(Error::Config(_))),
                "{url} should be rejected"
            );
        }
        assert!(ApiConfig::new("http://192.168.1.20:8081").validate().is_ok());
    }

    #[test]
    fn test_log_dir_is_optional() {
        let config = ApiConfig::from_json(r#"{"backendUrl": "http://x", "logDir": "/var/log/screentime"}"#).unwrap();
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/screentime")));

        let raw = serde_json::to_value(ApiConfig::new("http://x")).unwrap();
        assert!(raw.get("logDir").is_none());
    }
}
