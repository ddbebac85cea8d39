//! Data models and structures for the network speed tester

pub mod config;
pub mod history;
pub mod metrics;

// Re-export main model types
pub use config::Config;
pub use history::RunHistory;
pub use metrics::{
    DownloadResult, LatencyReport, Measurement, Observation, Sample, TestRun, UploadResult,
};
