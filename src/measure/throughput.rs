//! Download and upload throughput measurement

use crate::{
    client::HttpClient,
    clock::{Mark, SampleClock},
    error::{AppError, Result},
    logging::TransferLogger,
    models::{DownloadResult, Observation, Sample, UploadResult},
    orchestrator::CancelHandle,
    stats::{self, BandwidthEstimator},
    types::TransferState,
};
use bytes::Bytes;
use futures::StreamExt;
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;

/// Pseudorandom upload payload of `size` bytes
pub fn generate_payload(size: usize) -> Bytes {
    let mut buffer = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut buffer);
    Bytes::from(buffer)
}

/// Number of chunks needed to send `payload` bytes in `chunk`-sized pieces
pub fn chunk_count(payload: u64, chunk: u64) -> u64 {
    if chunk == 0 {
        0
    } else {
        payload.div_ceil(chunk)
    }
}

/// Per-source figures of a finished download
struct SourceOutcome {
    bytes: u64,
    speed_mbps: f64,
    peak_mbps: f64,
    observations: usize,
}

/// Drives chunked downloads and uploads through an [`HttpClient`],
/// reporting progress through a callback.
///
/// Progress is reported whenever more than `progress_interval` has passed
/// since the previous report, plus once when a source (or the upload)
/// finishes. Rates are always computed over the cumulative window of the
/// current source.
pub struct ThroughputMeasurer {
    client: Arc<dyn HttpClient>,
    clock: SampleClock,
    logger: TransferLogger,
    cancel: CancelHandle,
}

impl ThroughputMeasurer {
    pub fn new(client: Arc<dyn HttpClient>, logger: TransferLogger) -> Self {
        Self {
            client,
            clock: SampleClock::new(),
            logger,
            cancel: CancelHandle::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Download each source in order. A failing source is logged and
    /// skipped; the phase fails only when every source failed.
    pub async fn measure_download<F>(
        &self,
        sources: &[String],
        progress_interval: Duration,
        mut on_progress: F,
    ) -> Result<DownloadResult>
    where
        F: FnMut(Observation) + Send,
    {
        let started = self.clock.mark();
        let mut speeds = Vec::with_capacity(sources.len());
        let mut peak_mbps: Option<f64> = None;
        let mut total_bytes = 0u64;
        let mut sample_count = 0usize;

        for (index, source) in sources.iter().enumerate() {
            self.cancel.check()?;
            self.logger
                .narrate(&format!(
                    "Testing download speed... ({}/{})",
                    index + 1,
                    sources.len()
                ))
                .await;

            let mut state = TransferState::Idle;
            match self
                .download_source(index, source, progress_interval, &mut state, &mut on_progress)
                .await
            {
                Ok(outcome) => {
                    speeds.push(outcome.speed_mbps);
                    total_bytes += outcome.bytes;
                    sample_count += outcome.observations;
                    peak_mbps = Some(peak_mbps.map_or(outcome.peak_mbps, |p| p.max(outcome.peak_mbps)));
                }
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(error) => {
                    state = state.transition(TransferState::Failed)?;
                    self.logger.log_source_failure(index, source, &error).await;
                }
            }
            debug_assert!(state.is_terminal());
        }

        let speed_mbps = stats::mean(&speeds).ok_or_else(|| {
            AppError::all_transfers_failed(format!(
                "all {} download sources failed",
                sources.len()
            ))
        })?;

        Ok(DownloadResult {
            speed_mbps,
            peak_mbps: peak_mbps.unwrap_or(speed_mbps),
            successful_sources: speeds.len(),
            attempted_sources: sources.len(),
            total_bytes,
            duration_seconds: self.clock.elapsed(&started),
            sample_count,
        })
    }

    async fn download_source<F>(
        &self,
        index: usize,
        source: &str,
        progress_interval: Duration,
        state: &mut TransferState,
        on_progress: &mut F,
    ) -> Result<SourceOutcome>
    where
        F: FnMut(Observation) + Send,
    {
        let interval = progress_interval.as_secs_f64();
        let started = self.clock.mark();
        let fetched = self.client.fetch(source).await;
        self.logger
            .log_http_request(
                source,
                "GET",
                fetched.as_ref().ok().map(|r| r.status_code),
                self.clock.elapsed_ms(&started),
            )
            .await;
        let response = fetched?;
        if !response.is_success() {
            return Err(AppError::http_request(format!(
                "{} returned HTTP {}",
                source, response.status_code
            )));
        }
        *state = state.transition(TransferState::InProgress)?;

        let content_length = response.content_length;
        let mut body = response.body;
        let mut bytes = 0u64;
        let mut last_report = started;
        let mut peak_mbps = 0.0f64;
        let mut observations = 0usize;

        while let Some(chunk) = body.next().await {
            self.cancel.check()?;
            bytes += chunk?.len() as u64;

            if self.clock.elapsed(&last_report) > interval {
                if let Some(observation) = self.observe(index, &started, bytes, content_length) {
                    peak_mbps = peak_mbps.max(observation.instantaneous_mbps);
                    observations += 1;
                    self.logger.log_observation(&observation).await;
                    on_progress(observation);
                }
                last_report = self.clock.mark();
            }
        }

        let elapsed = self.clock.elapsed(&started);
        let speed_mbps = BandwidthEstimator::estimate(bytes, elapsed)?;

        if let Some(observation) = self.observe(index, &started, bytes, content_length) {
            peak_mbps = peak_mbps.max(observation.instantaneous_mbps);
            observations += 1;
            on_progress(observation);
        }

        *state = state.transition(TransferState::Completed)?;
        Ok(SourceOutcome {
            bytes,
            speed_mbps,
            peak_mbps,
            observations,
        })
    }

    /// `None` while the window is still zero-length
    fn observe(
        &self,
        source_index: usize,
        started: &Mark,
        bytes: u64,
        content_length: Option<u64>,
    ) -> Option<Observation> {
        let elapsed = self.clock.elapsed(started);
        let instantaneous_mbps = BandwidthEstimator::estimate(bytes, elapsed).ok()?;

        Some(Observation {
            source_index,
            sample: Sample::new(elapsed, bytes),
            instantaneous_mbps,
            progress_percent: content_length
                .filter(|total| *total > 0)
                .map(|total| (bytes as f64 / total as f64 * 100.0).min(100.0)),
        })
    }

    /// POST a pseudorandom payload to `sink` in sequential chunks. A failed
    /// chunk is logged and not retried; its bytes do not count.
    pub async fn measure_upload<F>(
        &self,
        sink: &str,
        payload_size: u64,
        chunk_size: u64,
        progress_interval: Duration,
        mut on_progress: F,
    ) -> Result<UploadResult>
    where
        F: FnMut(Observation) + Send,
    {
        if payload_size == 0 || chunk_size == 0 {
            return Err(AppError::validation(format!(
                "upload needs a positive payload and chunk size, got {} and {}",
                payload_size, chunk_size
            )));
        }

        self.logger.narrate("Testing upload speed...").await;

        let chunk_len = usize::try_from(chunk_size).map_err(|_| {
            AppError::validation(format!("upload chunk of {} bytes is too large", chunk_size))
        })?;
        let total_chunks = usize::try_from(chunk_count(payload_size, chunk_size)).map_err(|_| {
            AppError::validation(format!("upload payload of {} bytes is too large", payload_size))
        })?;
        // One chunk of random bytes is resent for every piece of the payload
        let chunk_bytes = generate_payload(chunk_len);
        let interval = progress_interval.as_secs_f64();

        let started = self.clock.mark();
        let mut last_report = started;
        let mut state = TransferState::Idle.transition(TransferState::InProgress)?;
        let mut uploaded = 0u64;
        let mut failed_chunks = 0usize;
        let mut sample_count = 0usize;

        for index in 0..total_chunks {
            self.cancel.check()?;

            let sent = index as u64 * chunk_size;
            let length = chunk_size.min(payload_size - sent);
            let chunk = chunk_bytes.slice(..length as usize);

            let sent_at = self.clock.mark();
            let posted = self.client.post(sink, chunk).await;
            self.logger
                .log_http_request(
                    sink,
                    "POST",
                    posted.as_ref().ok().map(|r| r.status_code),
                    self.clock.elapsed_ms(&sent_at),
                )
                .await;

            match posted {
                Ok(response) if response.is_success() => uploaded += length,
                Ok(response) => {
                    failed_chunks += 1;
                    let error = AppError::http_request(format!(
                        "{} returned HTTP {}",
                        sink, response.status_code
                    ));
                    self.logger.log_chunk_failure(index, length, &error).await;
                }
                Err(error) => {
                    failed_chunks += 1;
                    self.logger.log_chunk_failure(index, length, &error).await;
                }
            }
            state = state.transition(TransferState::InProgress)?;

            let is_last = index + 1 == total_chunks;
            if is_last || self.clock.elapsed(&last_report) > interval {
                let elapsed = self.clock.elapsed(&started);
                if let Ok(instantaneous_mbps) = BandwidthEstimator::estimate(uploaded, elapsed) {
                    sample_count += 1;
                    on_progress(Observation {
                        source_index: 0,
                        sample: Sample::new(elapsed, uploaded),
                        instantaneous_mbps,
                        progress_percent: Some(uploaded as f64 / payload_size as f64 * 100.0),
                    });
                }
                last_report = self.clock.mark();
            }
        }

        if failed_chunks == total_chunks {
            state.transition(TransferState::Failed)?;
            return Err(AppError::all_transfers_failed(format!(
                "all {} upload chunks to {} failed",
                total_chunks, sink
            )));
        }

        let duration_seconds = self.clock.elapsed(&started);
        let speed_mbps = BandwidthEstimator::estimate(uploaded, duration_seconds)?;
        state.transition(TransferState::Completed)?;

        Ok(UploadResult {
            speed_mbps,
            duration_seconds,
            uploaded_bytes: uploaded,
            chunk_count: total_chunks,
            failed_chunks,
            sample_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::testing::{DownloadScript, Reply, ScriptedClient};
    use crate::models::Config;

    const MIB: u64 = 1024 * 1024;

    fn sources() -> Vec<String> {
        vec![
            "https://dl.test/a".to_string(),
            "https://dl.test/b".to_string(),
            "https://dl.test/c".to_string(),
        ]
    }

    fn measurer(client: Arc<ScriptedClient>) -> ThroughputMeasurer {
        ThroughputMeasurer::new(client, TransferLogger::new(&Config::default()))
    }

    #[test]
    fn test_chunk_count() {
        assert_eq!(chunk_count(5 * MIB, 64 * 1024), 80);
        assert_eq!(chunk_count(100, 30), 4);
        assert_eq!(chunk_count(100, 0), 0);
    }

    #[test]
    fn test_generate_payload() {
        let payload = generate_payload(4096);
        assert_eq!(payload.len(), 4096);
        // 4 KiB of zeros from a random source is not a realistic outcome
        assert!(payload.iter().any(|&b| b != 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_mean_of_successful_sources() {
        // 50 Mbps and 70 Mbps over one second each; the third source is down
        let client = ScriptedClient::new()
            .with_download("https://dl.test/a", DownloadScript::chunks(vec![(1000, 6_553_600)]))
            .with_download("https://dl.test/b", DownloadScript::chunks(vec![(1000, 9_175_040)]));

        let mut observations = Vec::new();
        let result = measurer(Arc::new(client))
            .measure_download(&sources(), Duration::from_millis(100), |o| observations.push(o))
            .await
            .unwrap();

        assert!((result.speed_mbps - 60.0).abs() < 1e-6);
        assert!((result.peak_mbps - 70.0).abs() < 1e-6);
        assert_eq!(result.successful_sources, 2);
        assert_eq!(result.attempted_sources, 3);
        assert_eq!(result.total_bytes, 6_553_600 + 9_175_040);
        assert!(!observations.is_empty());
        assert_eq!(result.sample_count, observations.len());
        assert!(observations.iter().all(|o| o.source_index < 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_progress_follows_interval() {
        // Ten 100 KiB chunks 250 ms apart with a 500 ms reporting interval
        let client = ScriptedClient::new().with_download(
            "https://dl.test/a",
            DownloadScript::chunks(vec![(250, 100 * 1024); 10]),
        );

        let mut observations = Vec::new();
        let result = measurer(Arc::new(client))
            .measure_download(&sources()[..1], Duration::from_millis(500), |o| {
                observations.push(o)
            })
            .await
            .unwrap();

        // Reports at 750 ms, 1500 ms, 2250 ms, plus the final one at 2500 ms
        assert_eq!(observations.len(), 4);
        let last = observations.last().unwrap();
        assert_eq!(last.sample.bytes, 1_024_000);
        assert_eq!(last.progress_percent, Some(100.0));
        assert!((last.sample.elapsed_seconds - 2.5).abs() < 1e-3);
        // 1,024,000 bytes * 8 / 2^20 / 2.5 s
        assert!((result.speed_mbps - 3.125).abs() < 1e-6);

        let first = observations.first().unwrap();
        assert_eq!(first.sample.bytes, 300 * 1024);
        assert!(first.progress_percent.unwrap() < 30.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_error_status_and_broken_stream_are_skipped() {
        let mut broken = DownloadScript::chunks(vec![(100, 1024)]);
        broken.break_after = true;
        let client = ScriptedClient::new()
            .with_download("https://dl.test/a", DownloadScript::status(503))
            .with_download("https://dl.test/b", broken)
            .with_download("https://dl.test/c", DownloadScript::chunks(vec![(500, 655_360)]));

        let result = measurer(Arc::new(client))
            .measure_download(&sources(), Duration::from_millis(100), |_| {})
            .await
            .unwrap();

        assert_eq!(result.successful_sources, 1);
        assert!((result.speed_mbps - 10.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_all_sources_failing() {
        let client = ScriptedClient::new()
            .with_download("https://dl.test/a", DownloadScript::status(404));

        let result = measurer(Arc::new(client))
            .measure_download(&sources(), Duration::from_millis(100), |_| {})
            .await;
        assert!(matches!(result, Err(AppError::AllTransfersFailed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_cancelled_between_chunks() {
        let cancel = CancelHandle::new();
        let trigger = cancel.clone();
        let client = ScriptedClient::new().with_download(
            "https://dl.test/a",
            DownloadScript::chunks(vec![(200, 1024); 5]),
        );

        let result = measurer(Arc::new(client))
            .with_cancel(cancel)
            .measure_download(&sources()[..1], Duration::from_millis(100), |_| {
                trigger.cancel()
            })
            .await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_skips_failed_chunks() {
        let client = Arc::new(
            ScriptedClient::new().with_post(|index| match index {
                10 => Reply::status(500, 10),
                40 => Reply::error(10),
                _ => Reply::ok(10),
            }),
        );

        let mut observations = Vec::new();
        let result = measurer(client.clone())
            .measure_upload(
                "https://up.test/post",
                5 * MIB,
                64 * 1024,
                Duration::from_millis(100),
                |o| observations.push(o),
            )
            .await
            .unwrap();

        assert_eq!(client.post_calls(), 80);
        assert_eq!(result.chunk_count, 80);
        assert_eq!(result.failed_chunks, 2);
        assert_eq!(result.uploaded_bytes, 5 * MIB - 2 * 64 * 1024);
        assert_eq!(client.posted_bytes(), result.uploaded_bytes);
        assert!((result.duration_seconds - 0.8).abs() < 1e-3);

        let expected = BandwidthEstimator::estimate(result.uploaded_bytes, result.duration_seconds).unwrap();
        assert!((result.speed_mbps - expected).abs() < 1e-9);

        // The final chunk always reports
        let last = observations.last().unwrap();
        assert_eq!(last.sample.bytes, result.uploaded_bytes);
        assert_eq!(result.sample_count, observations.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_last_chunk_is_short() {
        let client = Arc::new(ScriptedClient::new().with_post(|_| Reply::ok(5)));

        let result = measurer(client.clone())
            .measure_upload("https://up.test/post", 100, 30, Duration::from_secs(10), |_| {})
            .await
            .unwrap();

        assert_eq!(result.chunk_count, 4);
        assert_eq!(result.uploaded_bytes, 100);
        assert_eq!(result.sample_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_every_chunk_failing() {
        let client = Arc::new(ScriptedClient::new().with_post(|_| Reply::status(413, 1)));

        let result = measurer(client)
            .measure_upload("https://up.test/post", 256 * 1024, 64 * 1024, Duration::from_millis(100), |_| {})
            .await;
        assert!(matches!(result, Err(AppError::AllTransfersFailed(_))));
    }

    #[tokio::test]
    async fn test_upload_rejects_zero_chunk() {
        let client = Arc::new(ScriptedClient::new());
        let result = measurer(client)
            .measure_upload("https://up.test/post", 1024, 0, Duration::from_millis(100), |_| {})
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
