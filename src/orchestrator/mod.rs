//! Sequencing of ping, download and upload into a single speed test run

pub mod events;
pub mod session;

pub use events::{ChannelSink, EventReceiver, EventSink, RecordingSink, SpeedTestEvent};
pub use session::{ActiveRun, CancelHandle, RunGuard, SessionState};

use crate::{
    client::HttpClient,
    error::{AppError, FailureReason, Result},
    logging::{ErrorEventLogger, Logger, TransferLogger},
    measure::{LatencyProbe, ThroughputMeasurer},
    models::{Config, Measurement, Observation, TestRun},
    types::Phase,
};
use std::sync::Arc;
use std::time::Duration;

/// Everything a run needs to know, resolved from [`Config`]
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub download_sources: Vec<String>,
    pub upload_sink: String,
    pub upload_payload_bytes: u64,
    pub chunk_size_bytes: u64,
    pub progress_interval: Duration,
    pub ping_endpoints: Vec<String>,
    pub attempts_per_endpoint: u32,
    pub probe_timeout: Duration,
    pub inter_attempt_delay: Duration,
    pub watchdog: Duration,
}

impl From<&Config> for RunConfig {
    fn from(config: &Config) -> Self {
        Self {
            download_sources: config.download_sources.clone(),
            upload_sink: config.upload_sink.clone(),
            upload_payload_bytes: config.upload_payload_bytes,
            chunk_size_bytes: config.upload_chunk_bytes,
            progress_interval: config.progress_interval(),
            ping_endpoints: config.ping_endpoints.clone(),
            attempts_per_endpoint: config.ping_attempts,
            probe_timeout: config.probe_timeout(),
            inter_attempt_delay: config.inter_attempt_delay(),
            watchdog: config.watchdog(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Runs the three phases in order and reports them to an [`EventSink`].
///
/// A failed ping phase is logged and the run continues without latency.
/// A failed download or upload ends the run with a single `RunFailed`.
/// The whole phase sequence is bounded by the watchdog.
pub struct SpeedTestOrchestrator {
    config: RunConfig,
    probe: LatencyProbe,
    measurer: ThroughputMeasurer,
    guard: Arc<dyn RunGuard>,
    cancel: CancelHandle,
    logger: Logger,
    error_logger: ErrorEventLogger,
}

impl SpeedTestOrchestrator {
    pub fn new(config: RunConfig, client: Arc<dyn HttpClient>, logger: Logger) -> Self {
        let cancel = CancelHandle::new();
        let probe = LatencyProbe::new(
            Arc::clone(&client),
            TransferLogger::from_logger(logger.child("PING")),
        )
        .with_inter_attempt_delay(config.inter_attempt_delay)
        .with_cancel(cancel.clone());
        let measurer =
            ThroughputMeasurer::new(client, TransferLogger::from_logger(logger.child("NET")))
                .with_cancel(cancel.clone());

        Self {
            config,
            probe,
            measurer,
            guard: Arc::new(SessionState::new()),
            cancel,
            error_logger: ErrorEventLogger::from_logger(logger.child("ERR")),
            logger,
        }
    }

    /// Share run exclusivity with other orchestrators of the same session
    pub fn with_guard(mut self, guard: Arc<dyn RunGuard>) -> Self {
        self.guard = guard;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Ask the active run to stop at its next chunk, source or attempt
    /// boundary. A request made while idle applies to the next run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_active()
    }

    /// Execute one run. Fails with `TestAlreadyInProgress`, without emitting
    /// anything, while another run holds the session.
    pub async fn run(&self, sink: &dyn EventSink) -> Result<TestRun> {
        let _active = ActiveRun::acquire(self.guard.as_ref(), &self.cancel)?;

        let mut run = TestRun::new();
        let run_id = run.id.to_string();
        self.logger
            .start_operation_with_id("speed_test", &run_id)
            .await;

        let phases =
            tokio::time::timeout(self.config.watchdog, self.run_phases(&mut run, sink)).await;
        let outcome = match phases {
            Ok(result) => result,
            Err(_) => Err(AppError::timeout(format!(
                "speed test exceeded the {:.0}s watchdog",
                self.config.watchdog.as_secs_f64()
            ))),
        }
        .and_then(|()| run.complete());

        match outcome {
            Ok(()) => {
                self.logger
                    .info("Speed test completed")
                    .field("download_mbps", run.download_mbps())
                    .field("upload_mbps", run.upload_mbps())
                    .field("latency_ms", run.latency_ms())
                    .log()
                    .await;
                sink.emit(SpeedTestEvent::RunCompleted {
                    test_run: run.clone(),
                });
                self.logger.end_operation(&run_id, "speed_test", true).await;
                Ok(run)
            }
            Err(error) => {
                self.error_logger
                    .log_error(&error, Some("Speed test failed"), Some(&run_id))
                    .await;
                sink.emit(SpeedTestEvent::RunFailed {
                    reason: FailureReason::from(&error),
                    message: error.to_string(),
                });
                self.logger.end_operation(&run_id, "speed_test", false).await;
                Err(error)
            }
        }
    }

    async fn run_phases(&self, run: &mut TestRun, sink: &dyn EventSink) -> Result<()> {
        let config = &self.config;

        self.cancel.check()?;
        sink.emit(SpeedTestEvent::PhaseStarted { phase: Phase::Ping });
        match self
            .probe
            .measure(
                &config.ping_endpoints,
                config.attempts_per_endpoint,
                config.probe_timeout,
            )
            .await
        {
            Ok(report) => {
                let measurement = Measurement::from(&report);
                run.record(measurement.clone())?;
                sink.emit(SpeedTestEvent::PhaseCompleted {
                    phase: Phase::Ping,
                    measurement,
                });
            }
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(error) if Phase::Ping.is_fatal_on_failure() => return Err(error),
            Err(error) => {
                self.logger
                    .warn("Ping phase failed, continuing without latency")
                    .error_info(&error)
                    .field("error", error.to_string())
                    .log()
                    .await;
            }
        }

        self.cancel.check()?;
        sink.emit(SpeedTestEvent::PhaseStarted {
            phase: Phase::Download,
        });
        let download = self
            .measurer
            .measure_download(&config.download_sources, config.progress_interval, |o| {
                sink.emit(progress(Phase::Download, o))
            })
            .await?;
        let measurement = Measurement::from(&download);
        run.record(measurement.clone())?;
        sink.emit(SpeedTestEvent::PhaseCompleted {
            phase: Phase::Download,
            measurement,
        });

        self.cancel.check()?;
        sink.emit(SpeedTestEvent::PhaseStarted {
            phase: Phase::Upload,
        });
        let upload = self
            .measurer
            .measure_upload(
                &config.upload_sink,
                config.upload_payload_bytes,
                config.chunk_size_bytes,
                config.progress_interval,
                |o| sink.emit(progress(Phase::Upload, o)),
            )
            .await?;
        let measurement = Measurement::from(&upload);
        run.record(measurement.clone())?;
        sink.emit(SpeedTestEvent::PhaseCompleted {
            phase: Phase::Upload,
            measurement,
        });

        Ok(())
    }
}

fn progress(phase: Phase, observation: Observation) -> SpeedTestEvent {
    SpeedTestEvent::Progress {
        phase,
        sample: observation.sample,
        speed_mbps: observation.instantaneous_mbps,
        progress_percent: observation.progress_percent,
    }
}
