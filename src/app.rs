//! Main application orchestration and execution

use crate::{
    cli::Cli,
    client::{HttpClient, NetworkClient},
    config::{display_config_summary, load_config, EnvManager},
    error::{AppError, Result},
    logging::{Logger, LoggerFactory},
    models::{Config, RunHistory, TestRun},
    orchestrator::{ChannelSink, EventReceiver, RunConfig, SpeedTestEvent, SpeedTestOrchestrator},
    output::{OutputFormatter, OutputFormatterFactory},
};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Main application struct that coordinates all components
pub struct App {
    config: Config,
    client: Arc<dyn HttpClient>,
    formatter: Arc<dyn OutputFormatter>,
    history: RunHistory,
}

impl App {
    /// Create a new application instance from CLI arguments
    pub fn new(cli: Cli) -> Result<Self> {
        cli.validate().map_err(AppError::config)?;
        let config = load_config(cli)?;
        let client: Arc<dyn HttpClient> = Arc::new(NetworkClient::from_config(&config)?);
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: Config, client: Arc<dyn HttpClient>) -> Self {
        let formatter: Arc<dyn OutputFormatter> =
            OutputFormatterFactory::create_formatter(config.enable_color, config.verbose).into();
        Self {
            config,
            client,
            formatter,
            history: RunHistory::default(),
        }
    }

    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    /// Run the configured number of speed tests. Stops at the first failed
    /// run and returns its error.
    pub async fn run(&mut self) -> Result<()> {
        let factory = LoggerFactory::new(self.config.clone());
        let logger = factory.create_logger("APP");

        if self.config.debug {
            self.print_debug_info(&logger).await;
        }
        if self.config.verbose {
            let mut warnings = EnvManager::validate_current_env();
            if let Ok(Some(file_warnings)) = EnvManager::check_env_file(Path::new(".env")) {
                warnings.extend(file_warnings);
            }
            for warning in warnings {
                logger.warn(&warning).log().await;
            }
        }

        let orchestrator = SpeedTestOrchestrator::new(
            RunConfig::from(&self.config),
            Arc::clone(&self.client),
            factory.create_logger("RUN"),
        );

        let cancel = orchestrator.cancel_handle();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        if !self.config.json_output {
            println!("{}", self.formatter.format_header(&format!("Network Speed Tester v{}", crate::VERSION))?);
        }

        let mut outcome = Ok(());
        for iteration in 1..=self.config.repeat {
            if self.config.repeat > 1 && !self.config.json_output {
                println!("\nRun {}/{}", iteration, self.config.repeat);
            }

            match self.run_once(&orchestrator, &logger).await {
                Ok(run) => self.history.push(run),
                Err(error) => {
                    outcome = Err(error);
                    break;
                }
            }
        }
        interrupt.abort();

        if self.history.len() > 1 && !self.config.json_output {
            println!("\n{}", self.formatter.format_history(&self.history)?);
        }

        logger
            .debug("Session finished")
            .field("session_id", factory.session_id())
            .field("completed_runs", self.history.len())
            .log()
            .await;

        outcome
    }

    /// Run one test while a separate task renders its events as they arrive
    async fn run_once(&self, orchestrator: &SpeedTestOrchestrator, logger: &Logger) -> Result<TestRun> {
        let (sink, receiver) = ChannelSink::new(crate::defaults::DEFAULT_EVENT_BUFFER);
        let renderer = tokio::spawn(render_events(
            receiver,
            Arc::clone(&self.formatter),
            self.config.json_output,
        ));

        let result = orchestrator.run(&sink).await;
        let dropped = sink.dropped();
        drop(sink);

        if dropped > 0 {
            logger
                .warn("Progress events were dropped by a slow consumer")
                .field("dropped", dropped)
                .log()
                .await;
        }

        renderer
            .await
            .map_err(|e| AppError::internal(format!("event renderer stopped: {}", e)))??;
        result
    }

    async fn print_debug_info(&self, logger: &Logger) {
        logger
            .debug("Build information")
            .field("package", crate::PKG_NAME)
            .field("version", crate::VERSION)
            .field("build_time", crate::BUILD_TIME)
            .field("git_commit", crate::GIT_COMMIT.unwrap_or("unknown"))
            .log()
            .await;

        for line in display_config_summary(&self.config).lines() {
            logger.debug(line).log().await;
        }
    }
}

/// Write events to stdout until the sink is dropped
async fn render_events(
    mut receiver: EventReceiver,
    formatter: Arc<dyn OutputFormatter>,
    json_output: bool,
) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    // Keep draining after a formatting error so queued events are released
    let mut first_error = None;

    while let Some(event) = receiver.recv().await {
        let written = match render_event(&event, formatter.as_ref(), json_output) {
            Ok(text) if text.is_empty() => Ok(()),
            Ok(text) => stdout.write_all(text.as_bytes()).await.map_err(AppError::from),
            Err(error) => Err(error),
        };
        if let Err(error) = written {
            first_error.get_or_insert(error);
        }
    }
    stdout.flush().await?;

    first_error.map_or(Ok(()), Err)
}

fn render_event(event: &SpeedTestEvent, formatter: &dyn OutputFormatter, json_output: bool) -> Result<String> {
    if json_output {
        return Ok(format!("{}\n", event.to_json_line()?));
    }

    let mut text = String::new();
    if let Some(line) = formatter.format_event(event)? {
        text.push_str(&line);
        text.push('\n');
    }
    if let SpeedTestEvent::RunCompleted { test_run } = event {
        text.push_str(&format!("\n{}\n", formatter.format_run_summary(test_run)?));
    }
    Ok(text)
}
