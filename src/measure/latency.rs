//! Latency probing with repeated HEAD round trips

use crate::{
    client::HttpClient,
    clock::SampleClock,
    error::{AppError, Result},
    logging::TransferLogger,
    models::LatencyReport,
    orchestrator::CancelHandle,
    stats,
};
use std::sync::Arc;
use std::time::Duration;

/// Measures round-trip latency against one or more endpoints.
///
/// Every completed HTTP exchange counts as a round trip, whatever its
/// status. An attempt that errors or exceeds the timeout is dropped and not
/// retried. The reported latency is the element at `floor(n / 2)` of the
/// sorted round-trip times across all endpoints.
pub struct LatencyProbe {
    client: Arc<dyn HttpClient>,
    clock: SampleClock,
    logger: TransferLogger,
    inter_attempt_delay: Duration,
    cancel: CancelHandle,
}

impl LatencyProbe {
    pub fn new(client: Arc<dyn HttpClient>, logger: TransferLogger) -> Self {
        Self {
            client,
            clock: SampleClock::new(),
            logger,
            inter_attempt_delay: crate::defaults::DEFAULT_INTER_ATTEMPT_DELAY,
            cancel: CancelHandle::new(),
        }
    }

    pub fn with_inter_attempt_delay(mut self, delay: Duration) -> Self {
        self.inter_attempt_delay = delay;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn measure(
        &self,
        endpoints: &[String],
        attempts_per_endpoint: u32,
        timeout: Duration,
    ) -> Result<LatencyReport> {
        let started = self.clock.mark();
        let mut samples_ms = Vec::new();
        let mut attempts = 0u32;

        self.logger.narrate("Testing ping...").await;

        let total_attempts = endpoints.len() as u64 * u64::from(attempts_per_endpoint);
        for endpoint in endpoints {
            for attempt in 1..=attempts_per_endpoint {
                self.cancel.check()?;
                attempts += 1;

                let mark = self.clock.mark();
                let outcome = tokio::time::timeout(timeout, self.client.head(endpoint)).await;
                let rtt_ms = self.clock.elapsed_ms(&mark);

                match outcome {
                    Ok(Ok(_)) => {
                        samples_ms.push(rtt_ms);
                        self.logger
                            .log_probe_attempt(endpoint, attempt, Some(rtt_ms), None)
                            .await;
                    }
                    Ok(Err(error)) => {
                        self.logger
                            .log_probe_attempt(endpoint, attempt, None, Some(&error))
                            .await;
                    }
                    Err(_) => {
                        let error = AppError::timeout(format!(
                            "no response within {:.1}s",
                            timeout.as_secs_f64()
                        ));
                        self.logger
                            .log_probe_attempt(endpoint, attempt, None, Some(&error))
                            .await;
                    }
                }

                if u64::from(attempts) < total_attempts {
                    tokio::time::sleep(self.inter_attempt_delay).await;
                }
            }
        }

        let midpoint = stats::midpoint(&samples_ms).ok_or_else(|| {
            AppError::all_probes_failed(format!(
                "all {} probe attempts across {} endpoints failed",
                attempts,
                endpoints.len()
            ))
        })?;

        Ok(LatencyReport {
            latency_ms: midpoint.round() as u64,
            samples_ms,
            attempts,
            duration_seconds: self.clock.elapsed(&started),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::testing::{Reply, ScriptedClient};
    use crate::models::Config;

    fn endpoints() -> Vec<String> {
        vec![
            "https://a.test".to_string(),
            "https://b.test".to_string(),
            "https://c.test".to_string(),
        ]
    }

    fn probe(client: ScriptedClient) -> LatencyProbe {
        LatencyProbe::new(Arc::new(client), TransferLogger::new(&Config::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_midpoint_of_surviving_samples() {
        // One endpoint answers in 10, 20 and 30 ms; the others are down
        let client = ScriptedClient::new().with_head(|url, attempt| {
            if url == "https://b.test" {
                Reply::ok([10, 20, 30][attempt])
            } else {
                Reply::error(0)
            }
        });

        let report = probe(client)
            .measure(&endpoints(), 3, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(report.latency_ms, 20);
        assert_eq!(report.samples_ms.len(), 3);
        assert_eq!(report.attempts, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_counts_as_round_trip() {
        let client = ScriptedClient::new().with_head(|_, _| Reply::status(405, 15));

        let report = probe(client)
            .measure(&endpoints()[..1], 2, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(report.latency_ms, 15);
        assert_eq!(report.samples_ms.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_attempts_failing() {
        let report = probe(ScriptedClient::new())
            .measure(&endpoints(), 3, Duration::from_secs(5))
            .await;
        assert!(matches!(report, Err(AppError::AllProbesFailed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempts_time_out_and_are_not_retried() {
        let client = ScriptedClient::new().with_head(|_, attempt| {
            if attempt == 0 {
                Reply::hang()
            } else {
                Reply::ok(40)
            }
        });

        let report = probe(client)
            .with_inter_attempt_delay(Duration::ZERO)
            .measure(&endpoints()[..1], 2, Duration::from_millis(500))
            .await
            .unwrap();

        // The hung attempt is dropped, leaving the single 40 ms sample
        assert_eq!(report.samples_ms.len(), 1);
        assert_eq!(report.latency_ms, 40);
        assert_eq!(report.attempts, 2);
        assert!((report.duration_seconds - 0.54).abs() < 1e-3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_attempt_delay_is_applied() {
        let client = ScriptedClient::new().with_head(|_, _| Reply::ok(10));

        let report = probe(client)
            .measure(&endpoints()[..1], 3, Duration::from_secs(5))
            .await
            .unwrap();
        // 3 x 10 ms round trips with 100 ms pauses between them
        assert!((report.duration_seconds - 0.23).abs() < 1e-3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pause_after_final_attempt_across_endpoints() {
        let client = ScriptedClient::new().with_head(|_, _| Reply::ok(10));

        let report = probe(client)
            .measure(&endpoints()[..2], 1, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(report.attempts, 2);
        assert!((report.duration_seconds - 0.12).abs() < 1e-3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_probing() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        let client = ScriptedClient::new().with_head(|_, _| Reply::ok(10));

        let result = probe(client)
            .with_cancel(cancel)
            .measure(&endpoints(), 3, Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }
}
