//! Samples, per-phase measurements and test run records

use crate::error::{AppError, Result};
use crate::types::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cumulative transfer state at one progress tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since the current source (or upload) started
    pub elapsed_seconds: f64,
    /// Bytes transferred so far within the same window
    pub bytes: u64,
}

impl Sample {
    pub fn new(elapsed_seconds: f64, bytes: u64) -> Self {
        Self { elapsed_seconds, bytes }
    }
}

/// A progress sample enriched with the derived rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Zero-based index of the download source; always 0 for uploads
    pub source_index: usize,
    pub sample: Sample,
    /// Rate over the cumulative window of the current source
    pub instantaneous_mbps: f64,
    /// Completion percentage when the total size is known
    pub progress_percent: Option<f64>,
}

/// Outcome of a latency probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyReport {
    /// Midpoint of the sorted round-trip samples, rounded to whole ms
    pub latency_ms: u64,
    /// Successful round-trip times in the order they were taken
    pub samples_ms: Vec<f64>,
    /// Attempts made across all endpoints, successful or not
    pub attempts: u32,
    pub duration_seconds: f64,
}

/// Aggregate of a download phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadResult {
    /// Mean of per-source speeds over successful sources
    pub speed_mbps: f64,
    /// Highest instantaneous sample across all sources
    pub peak_mbps: f64,
    pub successful_sources: usize,
    pub attempted_sources: usize,
    pub total_bytes: u64,
    pub duration_seconds: f64,
    pub sample_count: usize,
}

/// Aggregate of an upload phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    pub speed_mbps: f64,
    pub duration_seconds: f64,
    /// Bytes of chunks the sink acknowledged; failed chunks are excluded
    pub uploaded_bytes: u64,
    pub chunk_count: usize,
    pub failed_chunks: usize,
    pub sample_count: usize,
}

/// Final figures of one phase. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub kind: Phase,
    pub speed_mbps: f64,
    pub duration_seconds: f64,
    pub sample_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_mbps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful_sources: Option<usize>,
}

impl From<&LatencyReport> for Measurement {
    fn from(report: &LatencyReport) -> Self {
        Self {
            kind: Phase::Ping,
            speed_mbps: 0.0,
            duration_seconds: report.duration_seconds,
            sample_count: report.samples_ms.len(),
            latency_ms: Some(report.latency_ms),
            peak_mbps: None,
            bytes: None,
            successful_sources: None,
        }
    }
}

impl From<&DownloadResult> for Measurement {
    fn from(result: &DownloadResult) -> Self {
        Self {
            kind: Phase::Download,
            speed_mbps: result.speed_mbps,
            duration_seconds: result.duration_seconds,
            sample_count: result.sample_count,
            latency_ms: None,
            peak_mbps: Some(result.peak_mbps),
            bytes: Some(result.total_bytes),
            successful_sources: Some(result.successful_sources),
        }
    }
}

impl From<&UploadResult> for Measurement {
    fn from(result: &UploadResult) -> Self {
        Self {
            kind: Phase::Upload,
            speed_mbps: result.speed_mbps,
            duration_seconds: result.duration_seconds,
            sample_count: result.sample_count,
            latency_ms: None,
            peak_mbps: None,
            bytes: Some(result.uploaded_bytes),
            successful_sources: None,
        }
    }
}

/// One speed test run. Phases are filled in order; once `completed_at` is
/// set the record rejects further changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ping: Option<Measurement>,
    pub download: Option<Measurement>,
    pub upload: Option<Measurement>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TestRun {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            ping: None,
            download: None,
            upload: None,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Store a phase measurement, enforcing ping -> download -> upload order
    pub fn record(&mut self, measurement: Measurement) -> Result<()> {
        if self.is_completed() {
            return Err(AppError::internal(format!(
                "Run {} is completed and cannot record {}",
                self.id, measurement.kind
            )));
        }

        let slot = match measurement.kind {
            Phase::Ping if self.download.is_none() && self.upload.is_none() => &mut self.ping,
            Phase::Download if self.upload.is_none() => &mut self.download,
            Phase::Upload if self.download.is_some() => &mut self.upload,
            kind => {
                return Err(AppError::internal(format!(
                    "Phase {} recorded out of order in run {}",
                    kind, self.id
                )))
            }
        };

        if slot.is_some() {
            return Err(AppError::internal(format!(
                "Phase {} already recorded in run {}",
                measurement.kind, self.id
            )));
        }

        *slot = Some(measurement);
        Ok(())
    }

    /// Seal the run
    pub fn complete(&mut self) -> Result<()> {
        if self.is_completed() {
            return Err(AppError::internal(format!("Run {} completed twice", self.id)));
        }
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Wall-clock duration between start and completion
    pub fn total_duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }

    pub fn download_mbps(&self) -> Option<f64> {
        self.download.as_ref().map(|m| m.speed_mbps)
    }

    pub fn upload_mbps(&self) -> Option<f64> {
        self.upload.as_ref().map(|m| m.speed_mbps)
    }

    pub fn latency_ms(&self) -> Option<u64> {
        self.ping.as_ref().and_then(|m| m.latency_ms)
    }
}

impl Default for TestRun {
    fn default() -> Self {
        Self::new()
    }
}
