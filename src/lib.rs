//! Network Speed Tester
//!
//! Measures latency, download and upload throughput against configurable
//! HTTP endpoints and reports progress as a stream of typed events that a
//! terminal renderer, a JSON-lines writer or any other transport can consume.

pub mod app;
pub mod cli;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod measure;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use clock::{Mark, SampleClock};
pub use error::{AppError, FailureReason, Result};
pub use measure::{LatencyProbe, ThroughputMeasurer};
pub use models::{Config, Measurement, RunHistory, Sample, TestRun};
pub use orchestrator::{
    CancelHandle, ChannelSink, EventReceiver, EventSink, RunConfig, RunGuard, SessionState, SpeedTestEvent,
    SpeedTestOrchestrator,
};
pub use output::{ColoredFormatter, OutputFormatter, OutputFormatterFactory, PlainFormatter};
pub use stats::BandwidthEstimator;
pub use types::Phase;

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const GIT_COMMIT: Option<&str> = option_env!("GIT_COMMIT");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_DOWNLOAD_SOURCES: &[&str] = &[
        "https://speed.cloudflare.com/__down?bytes=10000000",
        "https://speed.cloudflare.com/__down?bytes=25000000",
        "https://speed.cloudflare.com/__down?bytes=100000000",
    ];
    pub const DEFAULT_UPLOAD_SINK: &str = "https://httpbin.org/post";
    pub const DEFAULT_PING_ENDPOINTS: &[&str] = &[
        "https://www.google.com",
        "https://www.cloudflare.com",
        "https://www.github.com",
    ];
    pub const DEFAULT_PING_ATTEMPTS: u32 = 3;
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_INTER_ATTEMPT_DELAY: Duration = Duration::from_millis(100);
    pub const DEFAULT_UPLOAD_PAYLOAD_BYTES: u64 = 5 * 1024 * 1024;
    pub const DEFAULT_UPLOAD_CHUNK_BYTES: u64 = 64 * 1024;
    pub const MAX_UPLOAD_PAYLOAD_BYTES: u64 = 1024 * 1024 * 1024;
    pub const MAX_UPLOAD_CHUNK_BYTES: u64 = 64 * 1024 * 1024;
    pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);
    pub const DEFAULT_WATCHDOG: Duration = Duration::from_secs(60);
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_HISTORY_SIZE: usize = 5;
    pub const DEFAULT_EVENT_BUFFER: usize = 256;
    pub const DEFAULT_ENABLE_COLOR: bool = true;
}
