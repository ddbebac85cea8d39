//! Structured logging for the speed tester
//!
//! This module provides:
//! - Leveled, structured log entries with JSON fields
//! - Console and JSON output formats
//! - Session and per-run correlation ids shared between related loggers
//! - A transfer logger for probe attempts, HTTP exchanges and failures
//!
//! All output goes to stderr so stdout stays free for results and the
//! JSON-lines event stream.

use crate::error::{AppError, Result};
use crate::models::{Config, Observation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level - most detailed
    Trace = 0,
    /// Debug level - detailed information for debugging
    Debug = 1,
    /// Info level - general application information
    Info = 2,
    /// Warning level - recoverable problems such as a failed source
    Warn = 3,
    /// Error level - a run or phase failed
    Error = 4,
    /// Fatal level - the application cannot continue
    Fatal = 5,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",
            LogLevel::Debug => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Fatal => "\x1b[35m",
        }
    }

    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// Log entry structure for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Correlation ID tying the entry to a run
    pub correlation_id: Option<String>,
    pub fields: HashMap<String, serde_json::Value>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// JSON format for structured logging
    Json,
}

/// Context shared by every logger created from the same root
#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
    /// Correlation ID of the operation in progress, applied to entries
    /// that do not carry their own
    current_correlation_id: Option<String>,
}

/// Logger with pluggable output format
#[derive(Debug, Clone)]
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    format: LogFormat,
    name: String,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    pub fn new(name: String) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            format: LogFormat::Console,
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Create a logger whose level and format follow the configuration
    pub fn with_config(name: String, config: &Config) -> Self {
        Self::with_context(name, config, Arc::new(RwLock::new(LogContext::default())))
    }

    fn with_context(name: String, config: &Config, context: Arc<RwLock<LogContext>>) -> Self {
        let min_level = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        Self {
            min_level,
            use_color: config.enable_color,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            name,
            context,
        }
    }

    /// A logger with another name that shares this logger's context, so
    /// correlation ids set on one apply to both
    pub fn child(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start a correlated operation. Entries logged through this logger or
    /// its children carry `correlation_id` until `end_operation`.
    pub async fn start_operation_with_id(&self, operation_name: &str, correlation_id: &str) {
        {
            let mut context = self.context.write().await;
            context.current_correlation_id = Some(correlation_id.to_string());
        }

        self.debug(&format!("Started operation: {}", operation_name))
            .correlation_id(correlation_id)
            .field("operation", operation_name)
            .field("operation_type", "start")
            .log()
            .await;
    }

    pub async fn end_operation(&self, correlation_id: &str, operation_name: &str, success: bool) {
        self.debug(&format!(
            "Completed operation: {} (success: {})",
            operation_name, success
        ))
        .correlation_id(correlation_id)
        .field("operation", operation_name)
        .field("operation_type", "end")
        .field("success", success)
        .log()
        .await;

        let mut context = self.context.write().await;
        if context.current_correlation_id.as_deref() == Some(correlation_id) {
            context.current_correlation_id = None;
        }
    }

    /// Create a log entry builder
    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn trace(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            entry.fields.insert(
                "session_id".to_string(),
                serde_json::Value::String(session_id.clone()),
            );
        }
        if entry.correlation_id.is_none() {
            entry.correlation_id = context.current_correlation_id.clone();
        }
        drop(context);

        let output = match self.format {
            LogFormat::Console => self.format_console(&entry),
            LogFormat::Json => self.format_json(&entry),
        };

        let _ = writeln!(io::stderr(), "{}", output);
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!(
                "{}{:>5}{}",
                entry.level.color_code(),
                level_str,
                LogLevel::reset_code()
            )
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!(
            "{} {} [{}] {}",
            timestamp, formatted_level, entry.logger, entry.message
        );

        if let Some(correlation_id) = &entry.correlation_id {
            let short: String = correlation_id.chars().take(8).collect();
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let mut fields: Vec<String> = entry
                .fields
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            fields.sort();
            output.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        output
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => serde_json::json!({
                "error": "Failed to serialize log entry",
                "message": entry.message,
            })
            .to_string(),
        }
    }
}

/// Builder for a single log entry
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: HashMap::new(),
            },
        }
    }

    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// Attach the figures of a progress observation
    pub fn observation(self, observation: &Observation) -> Self {
        self.field("source_index", observation.source_index)
            .field("elapsed_seconds", observation.sample.elapsed_seconds)
            .field("bytes", observation.sample.bytes)
            .field("instantaneous_mbps", observation.instantaneous_mbps)
            .field("progress_percent", observation.progress_percent)
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error_exit_code", error.exit_code())
    }

    /// Finalize and write the log entry
    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

/// Logger for individual network exchanges made while measuring
#[derive(Debug, Clone)]
pub struct TransferLogger {
    logger: Logger,
}

impl TransferLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("NET".to_string(), config),
        }
    }

    pub fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Progress narration such as "Testing download speed... (2/3)"
    pub async fn narrate(&self, message: &str) {
        self.logger.info(message).log().await;
    }

    pub async fn log_probe_attempt(
        &self,
        endpoint: &str,
        attempt: u32,
        rtt_ms: Option<f64>,
        error: Option<&AppError>,
    ) {
        let (level, message) = match (rtt_ms, error) {
            (Some(rtt), _) => (
                LogLevel::Debug,
                format!("Probe {} attempt {}: {:.1}ms", endpoint, attempt, rtt),
            ),
            (None, Some(err)) => (
                LogLevel::Warn,
                format!("Probe {} attempt {} failed: {}", endpoint, attempt, err),
            ),
            (None, None) => (
                LogLevel::Warn,
                format!("Probe {} attempt {} failed", endpoint, attempt),
            ),
        };

        let mut builder = self
            .logger
            .log(level, &message)
            .field("endpoint", endpoint)
            .field("attempt", attempt)
            .field("rtt_ms", rtt_ms);
        if let Some(err) = error {
            builder = builder.error_info(err);
        }
        builder.log().await;
    }

    pub async fn log_http_request(
        &self,
        url: &str,
        method: &str,
        status_code: Option<u16>,
        duration_ms: f64,
    ) {
        let success = status_code.is_some_and(|code| (200..300).contains(&code));
        let level = if success { LogLevel::Debug } else { LogLevel::Warn };

        let message = format!(
            "{} {} -> {} in {:.1}ms",
            method,
            url,
            status_code.map_or("FAILED".to_string(), |c| c.to_string()),
            duration_ms
        );

        self.logger
            .log(level, &message)
            .field("url", url)
            .field("method", method)
            .field("status_code", status_code)
            .field("success", success)
            .field("duration_ms", duration_ms)
            .log()
            .await;
    }

    pub async fn log_observation(&self, observation: &Observation) {
        self.logger
            .trace("Transfer progress")
            .observation(observation)
            .log()
            .await;
    }

    pub async fn log_source_failure(&self, index: usize, url: &str, error: &AppError) {
        self.logger
            .warn(&format!("Download source {} failed: {}", index + 1, error))
            .field("source_index", index)
            .field("url", url)
            .error_info(error)
            .log()
            .await;
    }

    pub async fn log_chunk_failure(&self, index: usize, bytes: u64, error: &AppError) {
        self.logger
            .warn(&format!("Upload chunk {} failed: {}", index + 1, error))
            .field("chunk_index", index)
            .field("chunk_bytes", bytes)
            .error_info(error)
            .log()
            .await;
    }
}

/// Error event logger with enhanced context
#[derive(Debug, Clone)]
pub struct ErrorEventLogger {
    logger: Logger,
}

impl ErrorEventLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("ERR".to_string(), config),
        }
    }

    pub fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }

    /// Log an application error with full context
    pub async fn log_error(&self, error: &AppError, context: Option<&str>, correlation_id: Option<&str>) {
        let message = match context {
            Some(ctx) => format!("{}: {}", ctx, error),
            None => error.to_string(),
        };

        let mut builder = self.logger.error(&message).error_info(error);

        if let Some(id) = correlation_id {
            builder = builder.correlation_id(id);
        }
        if let Some(ctx) = context {
            builder = builder.field("context", ctx);
        }

        builder.log().await;
    }
}

/// Creates loggers that share one session context
pub struct LoggerFactory {
    config: Config,
    session_id: String,
    context: Arc<RwLock<LogContext>>,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        let session_id = Uuid::new_v4().to_string();
        let context = LogContext {
            session_id: Some(session_id.clone()),
            current_correlation_id: None,
        };

        Self {
            config,
            session_id,
            context: Arc::new(RwLock::new(context)),
        }
    }

    pub fn create_logger(&self, name: &str) -> Logger {
        Logger::with_context(name.to_string(), &self.config, Arc::clone(&self.context))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}
