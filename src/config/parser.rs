//! Configuration parsing from CLI arguments and environment variables

use crate::{cli::Cli, config::env::EnvManager, error::Result, models::Config};
use std::path::PathBuf;

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
    env_file: Option<PathBuf>,
}

impl ConfigParser {
    /// Create a new configuration parser reading `.env` from the working directory
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            env_file: Some(PathBuf::from(".env")),
        }
    }

    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    pub fn without_env_file(mut self) -> Self {
        self.env_file = None;
        self
    }

    /// Defaults, then .env, then the process environment, then CLI flags
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        if let Some(ref path) = self.env_file {
            EnvManager::load_env_file_from(path, self.cli.debug)?;
        }

        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        if !cli.download_urls.is_empty() {
            config.download_sources = cli.download_urls.clone();
        }
        if let Some(ref url) = cli.upload_url {
            config.upload_sink = url.clone();
        }
        if !cli.ping_urls.is_empty() {
            config.ping_endpoints = cli.ping_urls.clone();
        }
        if let Some(attempts) = cli.attempts {
            config.ping_attempts = attempts;
        }
        if let Some(timeout) = cli.probe_timeout {
            config.probe_timeout_seconds = timeout;
        }
        if let Some(watchdog) = cli.watchdog {
            config.watchdog_seconds = watchdog;
        }
        if let Some(payload) = cli.payload_bytes() {
            config.upload_payload_bytes = payload;
        }
        if let Some(chunk) = cli.chunk_bytes() {
            config.upload_chunk_bytes = chunk;
        }
        if let Some(interval) = cli.interval_ms {
            config.progress_interval_ms = interval;
        }

        if cli.no_color || cli.json {
            config.enable_color = false;
        } else if cli.color {
            config.enable_color = true;
        }

        // CLI-only settings
        config.repeat = cli.repeat;
        config.json_output = cli.json;
        config.verbose = cli.verbose;
        config.debug = cli.debug;
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    summary.push(format!("Download Sources: {}", config.download_sources.join(", ")));
    summary.push(format!("Upload Sink: {}", config.upload_sink));
    summary.push(format!("Ping Endpoints: {}", config.ping_endpoints.join(", ")));
    summary.push(format!(
        "Ping Attempts: {} (timeout {}s)",
        config.ping_attempts, config.probe_timeout_seconds
    ));
    summary.push(format!(
        "Upload Payload: {} bytes in {} byte chunks",
        config.upload_payload_bytes, config.upload_chunk_bytes
    ));
    summary.push(format!("Progress Interval: {}ms", config.progress_interval_ms));
    summary.push(format!("Watchdog: {}s", config.watchdog_seconds));
    summary.push(format!("Repeat: {}", config.repeat));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}
