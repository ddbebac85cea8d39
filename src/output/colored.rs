//! Colored formatter implementation with terminal color support
//!
//! Speeds and latencies are tinted by how good they are; the layout is
//! shared with the plain formatter.

use super::formatter::{
    fmt_error, format_bytes, format_mbps, format_seconds,
    FormattingOptions, OutputFormatter, PlainFormatter,
};
use crate::{
    error::Result,
    models::{Measurement, RunHistory, TestRun},
    orchestrator::SpeedTestEvent,
    types::{Phase, SpeedLevel},
};
use colored::*;
use std::fmt::Write as _;

impl SpeedLevel {
    /// Get color for this speed level
    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::VeryPoor => Color::Red,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Excellent => "●●●●●",
            Self::Good => "●●●●○",
            Self::Fair => "●●●○○",
            Self::Poor => "●●○○○",
            Self::VeryPoor => "●○○○○",
        }
    }
}

/// Latency color thresholds in milliseconds
fn latency_color(latency_ms: u64) -> Color {
    match latency_ms {
        0..=49 => Color::Green,
        50..=99 => Color::Cyan,
        100..=299 => Color::Yellow,
        _ => Color::Red,
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self {
            plain_formatter: PlainFormatter::new(options.clone()),
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn dimmed(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.dimmed()
        } else {
            text.normal()
        }
    }

    fn heading(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold().color(self.color_scheme.header)
        } else {
            text.normal()
        }
    }

    fn speed_colored(&self, mbps: f64) -> ColoredString {
        self.colorize(&format_mbps(mbps), SpeedLevel::from_mbps(mbps).color())
    }

    fn phase_label(&self, phase: Phase) -> ColoredString {
        let label = format!("{:>8}", phase.as_str());
        self.colorize(&label, self.color_scheme.info)
    }

    fn measurement_colored(&self, measurement: &Measurement) -> ColoredString {
        match (measurement.kind, measurement.latency_ms) {
            (Phase::Ping, Some(ms)) => self.colorize(&format!("{} ms", ms), latency_color(ms)),
            (Phase::Ping, None) => self.dimmed("n/a"),
            _ => self.speed_colored(measurement.speed_mbps),
        }
    }

    /// Text bar of `width` cells filled to `percent`
    fn progress_bar(&self, percent: f64, width: usize) -> String {
        let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
        let filled = filled.min(width);
        format!(
            "[{}{}]",
            self.colorize(&"█".repeat(filled), self.color_scheme.success),
            self.dimmed(&"░".repeat(width - filled))
        )
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let border = "═".repeat(title.chars().count() + 4);
        Ok(format!(
            "{}\n  {}  \n{}",
            self.colorize(&border, self.color_scheme.header),
            self.heading(title),
            self.colorize(&border, self.color_scheme.header)
        ))
    }

    fn format_event(&self, event: &SpeedTestEvent) -> Result<Option<String>> {
        let line = match event {
            SpeedTestEvent::PhaseStarted { phase } => {
                Some(format!("{} {}", self.phase_label(*phase), self.dimmed("starting...")))
            }
            SpeedTestEvent::Progress {
                phase,
                sample,
                speed_mbps,
                progress_percent,
            } => {
                if !self.options.verbose_mode {
                    return Ok(None);
                }
                let mut line = format!(
                    "{} {} {}",
                    self.phase_label(*phase),
                    self.speed_colored(*speed_mbps),
                    self.dimmed(&format!(
                        "{} / {}",
                        format_bytes(sample.bytes),
                        format_seconds(sample.elapsed_seconds)
                    ))
                );
                if let Some(percent) = progress_percent {
                    write!(line, " {} {:.0}%", self.progress_bar(*percent, 20), percent)
                        .map_err(fmt_error)?;
                }
                Some(line)
            }
            SpeedTestEvent::PhaseCompleted { phase, measurement } => Some(format!(
                "{} {} {}",
                self.phase_label(*phase),
                self.measurement_colored(measurement),
                self.dimmed(&format!("({})", format_seconds(measurement.duration_seconds)))
            )),
            SpeedTestEvent::RunCompleted { .. } => None,
            SpeedTestEvent::RunFailed { reason, message } => {
                Some(self.format_error(&format!("run failed ({}): {}", reason.as_str(), message))?)
            }
        };
        Ok(line)
    }

    fn format_run_summary(&self, run: &TestRun) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "{}", self.heading("Run Summary")).map_err(fmt_error)?;

        let latency = match run.ping {
            Some(ref ping) => self.measurement_colored(ping),
            None => self.dimmed("unavailable"),
        };
        writeln!(output, "  Latency   {}", latency).map_err(fmt_error)?;

        for (label, measurement) in [("Download", &run.download), ("Upload", &run.upload)] {
            if let Some(measurement) = measurement {
                let level = SpeedLevel::from_mbps(measurement.speed_mbps);
                write!(
                    output,
                    "  {:<9} {} {} {}",
                    label,
                    self.speed_colored(measurement.speed_mbps),
                    self.colorize(level.symbol(), level.color()),
                    level.description()
                )
                .map_err(fmt_error)?;
                if let Some(peak) = measurement.peak_mbps {
                    write!(output, " {}", self.dimmed(&format!("(peak {})", format_mbps(peak))))
                        .map_err(fmt_error)?;
                }
                output.push('\n');
            }
        }

        if let Some(duration) = run.total_duration() {
            write!(
                output,
                "  {:<9} {}",
                "Duration",
                format_seconds(duration.num_milliseconds() as f64 / 1000.0)
            )
            .map_err(fmt_error)?;
        }

        Ok(output.trim_end().to_string())
    }

    fn format_history(&self, history: &RunHistory) -> Result<String> {
        if history.is_empty() {
            return Ok(self.dimmed("No completed runs.").to_string());
        }

        let table = self.plain_formatter.create_table(
            &self.plain_formatter.history_table_format(),
            &PlainFormatter::history_rows(history),
        );

        let mut output = String::new();
        let mut seen_header = false;
        for line in table.lines() {
            let styled = if line.starts_with('+') {
                self.colorize(line, self.color_scheme.muted)
            } else if !seen_header {
                seen_header = true;
                self.bold(line)
            } else {
                line.normal()
            };
            writeln!(output, "{}", styled).map_err(fmt_error)?;
        }

        if history.len() > 1 {
            if let Some(avg) = history.average_download_mbps() {
                writeln!(output, "Average download: {}", self.speed_colored(avg)).map_err(fmt_error)?;
            }
            if let Some(avg) = history.average_upload_mbps() {
                writeln!(output, "Average upload:   {}", self.speed_colored(avg)).map_err(fmt_error)?;
            }
        }

        Ok(output.trim_end().to_string())
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!(
            "{} {}",
            self.colorize("✗", self.color_scheme.error),
            self.colorize(error, self.color_scheme.error)
        ))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("⚠", self.color_scheme.warning), warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("✓", self.color_scheme.success), message))
    }
}
