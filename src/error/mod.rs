//! Error handling for the network speed tester

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Custom error types for the network speed tester
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network connectivity errors
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP request errors (non-success status, body read failures)
    #[error("HTTP request error: {0}")]
    HttpRequest(String),

    /// A rate was requested over a zero or negative time window
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Every latency probe attempt failed
    #[error("All latency probes failed: {0}")]
    AllProbesFailed(String),

    /// Every source (download) or chunk (upload) of a transfer failed
    #[error("All transfers failed: {0}")]
    AllTransfersFailed(String),

    /// A run is already active for this session
    #[error("Test already in progress")]
    TestAlreadyInProgress,

    /// Request or run-level timeouts
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Run aborted through its cancel handle
    #[error("Test cancelled")]
    Cancelled,

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Parsing errors (URLs, JSON, etc.)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network(message.into())
    }

    /// Create a new HTTP request error
    pub fn http_request<S: Into<String>>(message: S) -> Self {
        Self::HttpRequest(message.into())
    }

    /// Create a new invalid duration error
    pub fn invalid_duration<S: Into<String>>(message: S) -> Self {
        Self::InvalidDuration(message.into())
    }

    /// Create a new probe exhaustion error
    pub fn all_probes_failed<S: Into<String>>(message: S) -> Self {
        Self::AllProbesFailed(message.into())
    }

    /// Create a new transfer exhaustion error
    pub fn all_transfers_failed<S: Into<String>>(message: S) -> Self {
        Self::AllTransfersFailed(message.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Network(_) => "NETWORK",
            Self::HttpRequest(_) => "HTTP",
            Self::InvalidDuration(_) => "DURATION",
            Self::AllProbesFailed(_) => "PROBE",
            Self::AllTransfersFailed(_) => "TRANSFER",
            Self::TestAlreadyInProgress => "BUSY",
            Self::Timeout(_) => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::Validation(_) => "VALIDATION",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Check if error is recoverable (the caller may start another run)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(_) | Self::HttpRequest(_) | Self::Timeout(_) => true,
            Self::AllProbesFailed(_) | Self::AllTransfersFailed(_) | Self::TestAlreadyInProgress => true,
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) | Self::InvalidDuration(_) => false,
            Self::Cancelled | Self::Io(_) | Self::Internal(_) => false,
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Config(msg) => {
                format!("Configuration problem: {}\n\nSuggestion: Check your .env file or command line arguments.", msg)
            }
            Self::Network(msg) => {
                format!("Network connectivity issue: {}\n\nSuggestion: Check your internet connection and try again.", msg)
            }
            Self::HttpRequest(msg) => {
                format!("HTTP request failed: {}\n\nSuggestion: The test endpoint may be down or rate limiting requests. Try a different source URL.", msg)
            }
            Self::InvalidDuration(msg) => {
                format!("Invalid measurement window: {}\n\nThis is likely a bug. Please report this issue with the error details.", msg)
            }
            Self::AllProbesFailed(msg) => {
                format!("Latency probes failed: {}\n\nSuggestion: Check that the ping endpoints are reachable or raise --probe-timeout.", msg)
            }
            Self::AllTransfersFailed(msg) => {
                format!("No transfer succeeded: {}\n\nSuggestion: Check your connection and the configured download/upload URLs.", msg)
            }
            Self::TestAlreadyInProgress => {
                "A speed test is already running.\n\nSuggestion: Wait for it to finish or cancel it first.".to_string()
            }
            Self::Timeout(msg) => {
                format!("Timed out: {}\n\nSuggestion: Increase the limit with --watchdog or use smaller download sources.", msg)
            }
            Self::Cancelled => {
                "The speed test was cancelled before it finished.".to_string()
            }
            Self::Validation(msg) => {
                format!("Invalid input: {}\n\nSuggestion: Check the format of your URLs and numeric options.", msg)
            }
            Self::Io(msg) => {
                format!("File operation failed: {}\n\nSuggestion: Check file permissions and disk space.", msg)
            }
            Self::Parse(msg) => {
                format!("Failed to parse data: {}\n\nSuggestion: Check the format of your input data or configuration files.", msg)
            }
            Self::Internal(msg) => {
                format!("Internal error: {}\n\nThis is likely a bug. Please report this issue with the error details.", msg)
            }
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,
            Self::Network(_) | Self::HttpRequest(_) => 2,
            Self::Timeout(_) => 3,
            Self::AllProbesFailed(_) | Self::AllTransfersFailed(_) => 4,
            Self::Io(_) => 5,
            Self::TestAlreadyInProgress => 6,
            Self::Cancelled => 130,
            Self::InvalidDuration(_) | Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Validation(_) | Self::Parse(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::Network(_) | Self::HttpRequest(_) | Self::AllProbesFailed(_) | Self::AllTransfersFailed(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::Timeout(_) | Self::Cancelled => {
                    format!("[{}] {}", category.blue().bold(), message.blue())
                }
                Self::TestAlreadyInProgress => {
                    format!("[{}] {}", category.magenta().bold(), message.magenta())
                }
                Self::Io(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::InvalidDuration(_) | Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

/// Machine-readable reason carried by a `RunFailed` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    AllTransfersFailed,
    AllProbesFailed,
    Timeout,
    Cancelled,
    Network,
    Internal,
}

impl FailureReason {
    /// Stable identifier used on the wire and in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllTransfersFailed => "all-transfers-failed",
            Self::AllProbesFailed => "all-probes-failed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Network => "network",
            Self::Internal => "internal",
        }
    }
}

impl From<&AppError> for FailureReason {
    fn from(error: &AppError) -> Self {
        match error {
            AppError::AllTransfersFailed(_) => Self::AllTransfersFailed,
            AppError::AllProbesFailed(_) => Self::AllProbesFailed,
            AppError::Timeout(_) => Self::Timeout,
            AppError::Cancelled => Self::Cancelled,
            AppError::Network(_) | AppError::HttpRequest(_) => Self::Network,
            _ => Self::Internal,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL parse error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(error.to_string())
        } else if error.is_connect() || error.is_request() {
            Self::network(error.to_string())
        } else {
            Self::http_request(error.to_string())
        }
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::num::ParseFloatError> for AppError {
    fn from(error: std::num::ParseFloatError) -> Self {
        Self::parse(format!("Float parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(error.to_string())
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Error context trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error
    fn context(self, message: &'static str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let original_error = e.into();
            let context = f();
            AppError::internal(format!("{}: {}", context, original_error))
        })
    }

    fn context(self, message: &'static str) -> Result<T> {
        self.with_context(|| message.to_string())
    }
}

/// Error reporter for user-facing error output
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Report an error to the user
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", error.format_for_console(self.use_color));

        if self.verbose {
            eprintln!();
            eprintln!("{}", error.user_friendly_message());

            if error.is_recoverable() {
                eprintln!();
                if self.use_color {
                    use colored::Colorize;
                    eprintln!("{}", "This error might be temporary. You can try running the test again.".green());
                } else {
                    eprintln!("This error might be temporary. You can try running the test again.");
                }
            }
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_error = AppError::config("Invalid configuration");
        assert_eq!(config_error.category(), "CONFIG");
        assert!(!config_error.is_recoverable());
        assert_eq!(config_error.exit_code(), 1);

        let transfer_error = AppError::all_transfers_failed("3 sources failed");
        assert_eq!(transfer_error.category(), "TRANSFER");
        assert!(transfer_error.is_recoverable());
        assert_eq!(transfer_error.exit_code(), 4);
    }

    #[test]
    fn test_error_display() {
        let error = AppError::all_probes_failed("no endpoint answered");
        let display = error.to_string();
        assert!(display.contains("All latency probes failed"));
        assert!(display.contains("no endpoint answered"));

        assert_eq!(AppError::TestAlreadyInProgress.to_string(), "Test already in progress");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(AppError::config("test").exit_code(), 1);
        assert_eq!(AppError::network("test").exit_code(), 2);
        assert_eq!(AppError::timeout("test").exit_code(), 3);
        assert_eq!(AppError::all_probes_failed("test").exit_code(), 4);
        assert_eq!(AppError::io("test").exit_code(), 5);
        assert_eq!(AppError::TestAlreadyInProgress.exit_code(), 6);
        assert_eq!(AppError::Cancelled.exit_code(), 130);
        assert_eq!(AppError::internal("test").exit_code(), 99);
    }

    #[test]
    fn test_failure_reason_mapping() {
        assert_eq!(
            FailureReason::from(&AppError::all_transfers_failed("x")),
            FailureReason::AllTransfersFailed
        );
        assert_eq!(FailureReason::from(&AppError::timeout("x")), FailureReason::Timeout);
        assert_eq!(FailureReason::from(&AppError::Cancelled), FailureReason::Cancelled);
        assert_eq!(FailureReason::from(&AppError::http_request("x")), FailureReason::Network);
        assert_eq!(FailureReason::from(&AppError::parse("x")), FailureReason::Internal);
    }

    #[test]
    fn test_failure_reason_wire_format() {
        let json = serde_json::to_string(&FailureReason::AllTransfersFailed).unwrap();
        assert_eq!(json, "\"all-transfers-failed\"");
        assert_eq!(FailureReason::Timeout.to_string(), "timeout");
    }

    #[test]
    fn test_user_friendly_messages() {
        let message = AppError::config("Invalid URL format").user_friendly_message();
        assert!(message.contains("Configuration problem"));
        assert!(message.contains("Suggestion:"));
        assert!(message.contains("Invalid URL format"));
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let app_error: AppError = io_error.into();
        assert_eq!(app_error.category(), "IO");

        let parse_error = "not_a_number".parse::<i32>().unwrap_err();
        let app_error: AppError = parse_error.into();
        assert_eq!(app_error.category(), "PARSE");

        let url_error = url::Url::parse("not-a-valid-url").unwrap_err();
        let app_error: AppError = url_error.into();
        assert!(app_error.to_string().contains("URL parse error"));

        let json_error = serde_json::from_str::<serde_json::Value>("{broken").unwrap_err();
        let app_error: AppError = json_error.into();
        assert!(app_error.to_string().contains("JSON parse error"));
    }

    #[test]
    fn test_dotenv_error_conversion() {
        let dotenv_error = dotenv::Error::LineParse(".env".to_string(), 1);
        let app_error: AppError = dotenv_error.into();
        assert_eq!(app_error.category(), "CONFIG");
    }

    #[test]
    fn test_error_context() {
        let result: Result<i32> = Err(AppError::network("Connection failed"));
        let error = result.context("While probing latency").unwrap_err();
        assert_eq!(error.category(), "INTERNAL");
        assert!(error.to_string().contains("While probing latency"));
        assert!(error.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_console_formatting() {
        let error = AppError::timeout("watchdog expired after 60s");
        assert!(error.format_for_console(false).starts_with("[TIMEOUT]"));
        assert!(error.format_for_console(true).contains("watchdog expired"));
    }

    #[test]
    fn test_anyhow_integration() {
        let app_error: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(app_error.category(), "INTERNAL");
    }
}
