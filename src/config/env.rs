//! Environment variable handling and .env file management

use crate::error::{AppError, ErrorContext, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load a .env file if it exists. Variables already present in the
    /// process environment are kept.
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<bool> {
        if !path.exists() {
            if debug {
                eprintln!("No .env file found, using defaults and CLI arguments");
            }
            return Ok(false);
        }

        dotenv::from_path(path)
            .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

        if debug {
            eprintln!("Loaded configuration from {}", path.display());
        }
        Ok(true)
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Network Speed Tester Configuration
#
# Values here are used as defaults and can be overridden by
# command-line arguments.

# Download sources, measured in order (comma-separated)
# DOWNLOAD_SOURCES=https://speed.cloudflare.com/__down?bytes=10000000

# Endpoint receiving upload chunks via POST
# UPLOAD_SINK=https://httpbin.org/post

# Latency endpoints probed with HEAD (comma-separated)
# PING_ENDPOINTS=https://www.google.com,https://www.cloudflare.com

# Probe attempts per latency endpoint (1-20)
# PING_ATTEMPTS=3

# Per-attempt probe timeout in seconds
# PROBE_TIMEOUT_SECONDS=5

# Upload payload and chunk sizes in bytes
# UPLOAD_PAYLOAD_BYTES=5242880
# UPLOAD_CHUNK_BYTES=65536

# Minimum milliseconds between progress updates
# PROGRESS_INTERVAL_MS=100

# Upper bound on a whole run in seconds (1-600)
# WATCHDOG_SECONDS=60

# HTTP request timeout in seconds
# REQUEST_TIMEOUT_SECONDS=30

# Enable colored output (true/false)
# ENABLE_COLOR=true

# Quick check on a slow link:
# UPLOAD_PAYLOAD_BYTES=1048576
# PING_ATTEMPTS=1
# WATCHDOG_SECONDS=30
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .with_context(|| format!("Failed to write example env file {}", path.display()))
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "DOWNLOAD_SOURCES" | "PING_ENDPOINTS" => {
                let entries: Vec<&str> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect();
                if entries.is_empty() {
                    return Err(AppError::config(format!("{} cannot be empty", key)));
                }
                for entry in entries {
                    validate_url_entry(key, entry)?;
                }
            }
            "UPLOAD_SINK" => validate_url_entry(key, value.trim())?,
            "PING_ATTEMPTS" => {
                let attempts = parse_value::<u32>(key, value)?;
                if attempts == 0 || attempts > 20 {
                    return Err(AppError::config(format!(
                        "PING_ATTEMPTS must be between 1 and 20, got: {}",
                        attempts
                    )));
                }
            }
            "PROBE_TIMEOUT_SECONDS" => {
                let timeout = parse_value::<f64>(key, value)?;
                if !timeout.is_finite() || timeout <= 0.0 || timeout > 60.0 {
                    return Err(AppError::config(format!(
                        "PROBE_TIMEOUT_SECONDS must be within (0, 60], got: {}",
                        timeout
                    )));
                }
            }
            "UPLOAD_PAYLOAD_BYTES" | "UPLOAD_CHUNK_BYTES" => {
                if parse_value::<u64>(key, value)? == 0 {
                    return Err(AppError::config(format!("{} must be greater than 0", key)));
                }
            }
            "PROGRESS_INTERVAL_MS" => {
                parse_value::<u64>(key, value)?;
            }
            "WATCHDOG_SECONDS" => {
                let watchdog = parse_value::<u64>(key, value)?;
                if watchdog == 0 || watchdog > 600 {
                    return Err(AppError::config(format!(
                        "WATCHDOG_SECONDS must be between 1 and 600, got: {}",
                        watchdog
                    )));
                }
            }
            "REQUEST_TIMEOUT_SECONDS" => {
                if parse_value::<u64>(key, value)? == 0 {
                    return Err(AppError::config("REQUEST_TIMEOUT_SECONDS must be greater than 0"));
                }
            }
            "ENABLE_COLOR" => {
                parse_value::<bool>(key, value)?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("DOWNLOAD_SOURCES", "Comma-separated download URLs", "https://speed.cloudflare.com/__down?bytes=10000000"),
            ("UPLOAD_SINK", "URL receiving upload chunks", "https://httpbin.org/post"),
            ("PING_ENDPOINTS", "Comma-separated latency URLs", "https://www.google.com,https://www.github.com"),
            ("PING_ATTEMPTS", "Probe attempts per endpoint (1-20)", "3"),
            ("PROBE_TIMEOUT_SECONDS", "Per-attempt probe timeout", "5"),
            ("UPLOAD_PAYLOAD_BYTES", "Total upload payload size", "5242880"),
            ("UPLOAD_CHUNK_BYTES", "Size of each upload POST", "65536"),
            ("PROGRESS_INTERVAL_MS", "Minimum spacing of progress updates", "100"),
            ("WATCHDOG_SECONDS", "Whole-run limit (1-600)", "60"),
            ("REQUEST_TIMEOUT_SECONDS", "HTTP request timeout", "30"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<24} {}\n", var, description));
            help.push_str(&format!("  {:<24} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| {
                let value = std::env::var(name).ok()?;
                Self::validate_env_var(name, &value)
                    .err()
                    .map(|e| format!("Warning: {}", e))
            })
            .collect()
    }

    /// Validate the `KEY=value` lines of an env file. `None` when absent.
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let warnings = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let (key, value) = line.split_once('=')?;
                Self::validate_env_var(key.trim(), value.trim())
                    .err()
                    .map(|e| format!("Line '{}': {}", line, e))
            })
            .collect();

        Ok(Some(warnings))
    }
}

fn validate_url_entry(key: &str, entry: &str) -> Result<()> {
    let parsed = url::Url::parse(entry)
        .map_err(|e| AppError::config(format!("Invalid {} entry '{}': {}", key, entry, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(AppError::config(format!(
            "{} entry '{}' must use http or https, not {}",
            key, entry, other
        ))),
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))
}
