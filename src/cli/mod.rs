//! Command-line interface

use clap::{ArgAction, Parser};

/// Network Speed Tester - measures latency, download and upload throughput
#[derive(Parser, Debug, Clone)]
#[command(name = "nst")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Download source URL (can be used multiple times)
    #[arg(long = "download-url", action = ArgAction::Append, value_name = "URL")]
    pub download_urls: Vec<String>,

    /// Upload sink URL receiving POSTed chunks
    #[arg(long = "upload-url", value_name = "URL")]
    pub upload_url: Option<String>,

    /// Latency endpoint probed with HEAD (can be used multiple times)
    #[arg(long = "ping-url", action = ArgAction::Append, value_name = "URL")]
    pub ping_urls: Vec<String>,

    /// Probe attempts per latency endpoint
    #[arg(short, long)]
    pub attempts: Option<u32>,

    /// Per-attempt probe timeout in seconds
    #[arg(long, value_parser = parse_seconds)]
    pub probe_timeout: Option<f64>,

    /// Upper bound on a whole run in seconds
    #[arg(short, long, value_parser = parse_watchdog)]
    pub watchdog: Option<u64>,

    /// Upload payload size in MiB
    #[arg(long, value_name = "MIB")]
    pub payload_mb: Option<u64>,

    /// Upload chunk size in KiB
    #[arg(long, value_name = "KIB")]
    pub chunk_kb: Option<u64>,

    /// Minimum milliseconds between progress updates
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Number of consecutive runs
    #[arg(short, long, default_value_t = 1)]
    pub repeat: u32,

    /// Print events as JSON lines on stdout
    #[arg(long)]
    pub json: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// List supported environment variables and exit
    #[arg(long)]
    pub env_help: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts and ranges
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.repeat == 0 || self.repeat > 10 {
            return Err(format!("--repeat must be between 1 and 10, got {}", self.repeat));
        }

        if let Some(attempts) = self.attempts {
            if attempts == 0 || attempts > 20 {
                return Err(format!("--attempts must be between 1 and 20, got {}", attempts));
            }
        }

        if self.payload_mb == Some(0) {
            return Err("--payload-mb must be greater than 0".to_string());
        }

        if self.chunk_kb == Some(0) {
            return Err("--chunk-kb must be greater than 0".to_string());
        }

        if self.payload_mb.is_some_and(|mb| mb > 1024) {
            return Err("--payload-mb cannot exceed 1024".to_string());
        }

        if let (Some(payload_mb), Some(chunk_kb)) = (self.payload_mb, self.chunk_kb) {
            if chunk_kb > payload_mb.saturating_mul(1024) {
                return Err("--chunk-kb cannot exceed the upload payload".to_string());
            }
        }

        Ok(())
    }

    /// Upload payload in bytes, when overridden
    pub fn payload_bytes(&self) -> Option<u64> {
        self.payload_mb.map(|mb| mb.saturating_mul(1024 * 1024))
    }

    /// Upload chunk size in bytes, when overridden
    pub fn chunk_bytes(&self) -> Option<u64> {
        self.chunk_kb.map(|kb| kb.saturating_mul(1024))
    }

    /// Check if colors should be used based on flags and terminal support
    pub fn use_colors(&self) -> bool {
        if self.no_color || self.json {
            false
        } else if self.color {
            true
        } else {
            supports_color()
        }
    }

    /// One-line summary of the overrides given on the command line
    pub fn get_config_summary(&self) -> String {
        let mut parts = Vec::new();

        if !self.download_urls.is_empty() {
            parts.push(format!("downloads: {}", self.download_urls.len()));
        }
        if let Some(ref url) = self.upload_url {
            parts.push(format!("upload: {}", url));
        }
        if !self.ping_urls.is_empty() {
            parts.push(format!("pings: {}", self.ping_urls.len()));
        }
        if let Some(attempts) = self.attempts {
            parts.push(format!("attempts: {}", attempts));
        }
        if let Some(watchdog) = self.watchdog {
            parts.push(format!("watchdog: {}s", watchdog));
        }
        if self.repeat > 1 {
            parts.push(format!("repeat: {}", self.repeat));
        }
        if self.json {
            parts.push("json".to_string());
        }
        if self.verbose {
            parts.push("verbose".to_string());
        }
        if self.debug {
            parts.push("debug".to_string());
        }

        if parts.is_empty() {
            "defaults".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Positive, finite seconds; fractions allowed
fn parse_seconds(s: &str) -> Result<f64, String> {
    if s.starts_with('+') {
        return Err(format!("Invalid duration: {}", s));
    }

    let secs: f64 = s.parse().map_err(|_| format!("Invalid duration: {}", s))?;
    if !secs.is_finite() || secs <= 0.0 {
        Err("Duration must be greater than 0".to_string())
    } else if secs > 60.0 {
        Err("Probe timeout cannot exceed 60 seconds".to_string())
    } else {
        Ok(secs)
    }
}

fn parse_watchdog(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else if secs > 600 {
                Err("Watchdog cannot exceed 600 seconds".to_string())
            } else {
                Ok(secs)
            }
        })
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    cfg!(unix)
}
