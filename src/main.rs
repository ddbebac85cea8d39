//! Network Speed Tester - Main CLI Application
//!
//! Measures latency, download and upload throughput against configurable
//! HTTP endpoints.

use clap::Parser;
use network_speed_tester::{app::App, cli::Cli, config::EnvManager, error::ErrorReporter};
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        eprintln!("Please report this issue at: https://github.com/MaurUppi/network-speed-tester/issues");
        process::exit(1);
    }));

    let cli = Cli::parse();
    if cli.env_help {
        print!("{}", EnvManager::display_env_help());
        return;
    }

    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose);

    let result = match App::new(cli) {
        Ok(mut app) => app.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        reporter.report_error(&e);
        process::exit(e.exit_code());
    }
}
