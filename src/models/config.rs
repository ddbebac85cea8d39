//! Configuration data model and validation

use crate::client::HttpUtils;
use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Download sources, measured in order
    #[serde(default = "default_download_sources")]
    pub download_sources: Vec<String>,

    /// Endpoint receiving upload chunks via POST
    #[serde(default = "default_upload_sink")]
    pub upload_sink: String,

    /// Endpoints probed with HEAD for latency
    #[serde(default = "default_ping_endpoints")]
    pub ping_endpoints: Vec<String>,

    /// Round trips attempted per ping endpoint
    #[serde(default = "default_ping_attempts")]
    pub ping_attempts: u32,

    /// Per-attempt latency probe timeout
    #[serde(default = "default_probe_timeout_seconds")]
    pub probe_timeout_seconds: f64,

    /// Delay after every probe attempt
    #[serde(default = "default_inter_attempt_delay_ms")]
    pub inter_attempt_delay_ms: u64,

    /// Total upload payload size
    #[serde(default = "default_upload_payload_bytes")]
    pub upload_payload_bytes: u64,

    /// Size of each POSTed upload chunk
    #[serde(default = "default_upload_chunk_bytes")]
    pub upload_chunk_bytes: u64,

    /// Minimum spacing of progress events
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Upper bound on a whole run
    #[serde(default = "default_watchdog_seconds")]
    pub watchdog_seconds: u64,

    /// HTTP client timeout for a single request
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Number of consecutive runs (CLI only)
    #[serde(default = "default_repeat")]
    pub repeat: u32,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Emit events as JSON lines instead of rendered text
    #[serde(default)]
    pub json_output: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_sources: default_download_sources(),
            upload_sink: default_upload_sink(),
            ping_endpoints: default_ping_endpoints(),
            ping_attempts: default_ping_attempts(),
            probe_timeout_seconds: default_probe_timeout_seconds(),
            inter_attempt_delay_ms: default_inter_attempt_delay_ms(),
            upload_payload_bytes: default_upload_payload_bytes(),
            upload_chunk_bytes: default_upload_chunk_bytes(),
            progress_interval_ms: default_progress_interval_ms(),
            watchdog_seconds: default_watchdog_seconds(),
            request_timeout_seconds: default_request_timeout_seconds(),
            repeat: default_repeat(),
            enable_color: default_enable_color(),
            json_output: false,
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.probe_timeout_seconds)
    }

    pub fn watchdog(&self) -> Duration {
        Duration::from_secs(self.watchdog_seconds)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn inter_attempt_delay(&self) -> Duration {
        Duration::from_millis(self.inter_attempt_delay_ms)
    }

    /// Validate the configuration and return the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.download_sources.is_empty() {
            return Err(AppError::config("At least one download source is required"));
        }
        for source in &self.download_sources {
            validate_http_url("download source", source)?;
        }

        validate_http_url("upload sink", &self.upload_sink)?;

        if self.ping_endpoints.is_empty() {
            return Err(AppError::config("At least one ping endpoint is required"));
        }
        for endpoint in &self.ping_endpoints {
            validate_http_url("ping endpoint", endpoint)?;
        }

        if self.ping_attempts == 0 {
            return Err(AppError::config("Ping attempts must be greater than 0"));
        }
        if self.ping_attempts > 20 {
            return Err(AppError::config("Ping attempts cannot exceed 20"));
        }

        if !self.probe_timeout_seconds.is_finite()
            || self.probe_timeout_seconds <= 0.0
            || self.probe_timeout_seconds > 60.0
        {
            return Err(AppError::config(format!(
                "Probe timeout must be within (0, 60] seconds, got {}",
                self.probe_timeout_seconds
            )));
        }

        if self.upload_payload_bytes == 0 {
            return Err(AppError::config("Upload payload must be greater than 0 bytes"));
        }
        if self.upload_chunk_bytes == 0 {
            return Err(AppError::config("Upload chunk size must be greater than 0 bytes"));
        }
        if self.upload_payload_bytes > crate::defaults::MAX_UPLOAD_PAYLOAD_BYTES {
            return Err(AppError::config(format!(
                "Upload payload cannot exceed {} bytes, got {}",
                crate::defaults::MAX_UPLOAD_PAYLOAD_BYTES,
                self.upload_payload_bytes
            )));
        }
        if self.upload_chunk_bytes > crate::defaults::MAX_UPLOAD_CHUNK_BYTES {
            return Err(AppError::config(format!(
                "Upload chunk size cannot exceed {} bytes, got {}",
                crate::defaults::MAX_UPLOAD_CHUNK_BYTES,
                self.upload_chunk_bytes
            )));
        }
        if self.upload_chunk_bytes > self.upload_payload_bytes {
            return Err(AppError::config(format!(
                "Upload chunk size ({} bytes) cannot exceed the payload ({} bytes)",
                self.upload_chunk_bytes, self.upload_payload_bytes
            )));
        }

        if self.watchdog_seconds == 0 {
            return Err(AppError::config("Watchdog must be greater than 0"));
        }
        if self.watchdog_seconds > 600 {
            return Err(AppError::config("Watchdog cannot exceed 600 seconds"));
        }

        if self.request_timeout_seconds == 0 {
            return Err(AppError::config("Request timeout must be greater than 0"));
        }

        if self.repeat == 0 || self.repeat > 10 {
            return Err(AppError::config("Repeat count must be between 1 and 10"));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(sources) = std::env::var("DOWNLOAD_SOURCES") {
            self.download_sources = split_list(&sources);
        }

        if let Ok(sink) = std::env::var("UPLOAD_SINK") {
            self.upload_sink = sink.trim().to_string();
        }

        if let Ok(endpoints) = std::env::var("PING_ENDPOINTS") {
            self.ping_endpoints = split_list(&endpoints);
        }

        if let Some(value) = parse_env("PING_ATTEMPTS")? {
            self.ping_attempts = value;
        }
        if let Some(value) = parse_env("PROBE_TIMEOUT_SECONDS")? {
            self.probe_timeout_seconds = value;
        }
        if let Some(value) = parse_env("UPLOAD_PAYLOAD_BYTES")? {
            self.upload_payload_bytes = value;
        }
        if let Some(value) = parse_env("UPLOAD_CHUNK_BYTES")? {
            self.upload_chunk_bytes = value;
        }
        if let Some(value) = parse_env("PROGRESS_INTERVAL_MS")? {
            self.progress_interval_ms = value;
        }
        if let Some(value) = parse_env("WATCHDOG_SECONDS")? {
            self.watchdog_seconds = value;
        }
        if let Some(value) = parse_env("REQUEST_TIMEOUT_SECONDS")? {
            self.request_timeout_seconds = value;
        }
        if let Some(value) = parse_env("ENABLE_COLOR")? {
            self.enable_color = value;
        }

        Ok(())
    }
}

fn validate_http_url(label: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AppError::config(format!("The {} URL cannot be empty", label)));
    }

    HttpUtils::validate_url(value).map_err(|e| {
        AppError::config(format!("Invalid {} URL '{}': {}", label, value, e))
    })
}

/// Comma separated list with blanks removed
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}

// Default value functions for serde
fn default_download_sources() -> Vec<String> {
    crate::defaults::DEFAULT_DOWNLOAD_SOURCES
        .iter()
        .map(|&s| s.to_string())
        .collect()
}

fn default_upload_sink() -> String {
    crate::defaults::DEFAULT_UPLOAD_SINK.to_string()
}

fn default_ping_endpoints() -> Vec<String> {
    crate::defaults::DEFAULT_PING_ENDPOINTS
        .iter()
        .map(|&s| s.to_string())
        .collect()
}

fn default_ping_attempts() -> u32 {
    crate::defaults::DEFAULT_PING_ATTEMPTS
}

fn default_probe_timeout_seconds() -> f64 {
    crate::defaults::DEFAULT_PROBE_TIMEOUT.as_secs_f64()
}

fn default_inter_attempt_delay_ms() -> u64 {
    crate::defaults::DEFAULT_INTER_ATTEMPT_DELAY.as_millis() as u64
}

fn default_upload_payload_bytes() -> u64 {
    crate::defaults::DEFAULT_UPLOAD_PAYLOAD_BYTES
}

fn default_upload_chunk_bytes() -> u64 {
    crate::defaults::DEFAULT_UPLOAD_CHUNK_BYTES
}

fn default_progress_interval_ms() -> u64 {
    crate::defaults::DEFAULT_PROGRESS_INTERVAL.as_millis() as u64
}

fn default_watchdog_seconds() -> u64 {
    crate::defaults::DEFAULT_WATCHDOG.as_secs()
}

fn default_request_timeout_seconds() -> u64 {
    crate::defaults::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_repeat() -> u32 {
    1
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.download_sources.len(), 3);
        assert_eq!(config.ping_attempts, 3);
        assert_eq!(config.upload_payload_bytes, 5 * 1024 * 1024);
        assert_eq!(config.upload_chunk_bytes, 64 * 1024);
        assert_eq!(config.watchdog(), Duration::from_secs(60));
        assert_eq!(config.progress_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_empty_download_sources_invalid() {
        let mut config = Config::default();
        config.download_sources.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_source_url_format() {
        let mut config = Config::default();
        config.download_sources = vec!["not-a-url".to_string()];
        assert!(config.validate().is_err());

        config.download_sources = vec!["ftp://example.com/file".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_upload_sink() {
        let mut config = Config::default();
        config.upload_sink = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ping_attempt_bounds() {
        let mut config = Config::default();
        config.ping_attempts = 0;
        assert!(config.validate().is_err());
        config.ping_attempts = 21;
        assert!(config.validate().is_err());
        config.ping_attempts = 20;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chunk_size_rules() {
        let mut config = Config::default();
        config.upload_chunk_bytes = 0;
        assert!(config.validate().is_err());

        config.upload_chunk_bytes = config.upload_payload_bytes + 1;
        assert!(config.validate().is_err());

        config.upload_chunk_bytes = config.upload_payload_bytes;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_upload_size_limits() {
        let mut config = Config::default();
        config.upload_payload_bytes = 100_000 * 1024 * 1024;
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("cannot exceed"));

        config.upload_payload_bytes = crate::defaults::MAX_UPLOAD_PAYLOAD_BYTES;
        assert!(config.validate().is_ok());

        config.upload_chunk_bytes = crate::defaults::MAX_UPLOAD_CHUNK_BYTES + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_watchdog_and_probe_timeout_bounds() {
        let mut config = Config::default();
        config.watchdog_seconds = 0;
        assert!(config.validate().is_err());
        config.watchdog_seconds = 601;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.probe_timeout_seconds = 0.0;
        assert!(config.validate().is_err());
        config.probe_timeout_seconds = 60.5;
        assert!(config.validate().is_err());
        config.probe_timeout_seconds = 0.25;
        assert!(config.validate().is_ok());
        assert_eq!(config.probe_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_split_list_trims_and_drops_blanks() {
        assert_eq!(
            split_list(" https://a.test , ,https://b.test,"),
            vec!["https://a.test".to_string(), "https://b.test".to_string()]
        );
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"ping_attempts": 5, "upload_sink": "http://127.0.0.1/post"}"#)
                .unwrap();
        assert_eq!(config.ping_attempts, 5);
        assert_eq!(config.upload_sink, "http://127.0.0.1/post");
        assert_eq!(config.download_sources, Config::default().download_sources);
    }
}
