//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation with table formatting capabilities.

use crate::{
    error::{AppError, Result},
    models::{Measurement, RunHistory, TestRun},
    orchestrator::SpeedTestEvent,
    types::{Phase, SpeedLevel},
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Render one run event as a console line; `None` for events that print nothing
    fn format_event(&self, event: &SpeedTestEvent) -> Result<Option<String>>;

    /// Format the figures of a completed run
    fn format_run_summary(&self, run: &TestRun) -> Result<String>;

    /// Format the recent runs as a table
    fn format_history(&self, history: &RunHistory) -> Result<String>;

    /// Format error messages
    fn format_error(&self, error: &str) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Print every progress event instead of only phase boundaries
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    pub columns: Vec<Column>,
    pub show_borders: bool,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
    pub max_width: usize,
}

impl Column {
    pub fn new(header: &str, alignment: Alignment, min_width: usize, max_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            min_width,
            max_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone)]
pub enum Alignment {
    Left,
    Right,
    Center,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

pub(crate) fn fmt_error(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

/// Seconds as `850ms`, `12.4s` or `1m3.0s`
pub(crate) fn format_seconds(seconds: f64) -> String {
    if seconds < 1.0 {
        format!("{:.0}ms", seconds * 1000.0)
    } else if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else {
        let minutes = (seconds / 60.0) as u32;
        format!("{}m{:.1}s", minutes, seconds % 60.0)
    }
}

pub(crate) fn format_mbps(mbps: f64) -> String {
    if mbps >= 100.0 {
        format!("{:.0} Mbps", mbps)
    } else {
        format!("{:.2} Mbps", mbps)
    }
}

/// Binary-prefixed byte count
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Headline figure of a phase result, `23 ms` or `48.20 Mbps`
pub(crate) fn describe_measurement(measurement: &Measurement) -> String {
    match measurement.kind {
        Phase::Ping => match measurement.latency_ms {
            Some(ms) => format!("{} ms", ms),
            None => "n/a".to_string(),
        },
        Phase::Download | Phase::Upload => format_mbps(measurement.speed_mbps),
    }
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    /// Create a table with the given format and data
    pub(crate) fn create_table(&self, format: &TableFormat, rows: &[RowData]) -> String {
        if rows.is_empty() {
            return String::new();
        }

        let column_widths = calculate_column_widths(format, rows);
        let mut output = String::new();

        if format.show_borders {
            output.push_str(&create_horizontal_border(&column_widths));
            output.push('\n');
        }

        let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
        output.push_str(&create_row(&headers, &column_widths, format));
        output.push('\n');

        if format.show_borders {
            output.push_str(&create_horizontal_border(&column_widths));
            output.push('\n');
        }

        for row in rows {
            output.push_str(&create_row(row, &column_widths, format));
            output.push('\n');
        }

        if format.show_borders {
            output.push_str(&create_horizontal_border(&column_widths));
        }

        output
    }

    pub(crate) fn history_table_format(&self) -> TableFormat {
        TableFormat {
            columns: vec![
                Column::new("#", Alignment::Right, 1, 3),
                Column::new("Started", Alignment::Left, 8, 20),
                Column::new("Ping", Alignment::Right, 6, 10),
                Column::new("Download", Alignment::Right, 10, 14),
                Column::new("Upload", Alignment::Right, 10, 14),
                Column::new("Duration", Alignment::Right, 8, 10),
            ],
            show_borders: self.options.table_borders,
        }
    }

    pub(crate) fn history_rows(history: &RunHistory) -> Vec<RowData> {
        history
            .iter()
            .enumerate()
            .map(|(idx, run)| {
                vec![
                    (idx + 1).to_string(),
                    run.started_at.format("%H:%M:%S").to_string(),
                    run.latency_ms()
                        .map(|ms| format!("{} ms", ms))
                        .unwrap_or_else(|| "-".to_string()),
                    run.download_mbps().map(format_mbps).unwrap_or_else(|| "-".to_string()),
                    run.upload_mbps().map(format_mbps).unwrap_or_else(|| "-".to_string()),
                    run.total_duration()
                        .map(|d| format_seconds(d.num_milliseconds() as f64 / 1000.0))
                        .unwrap_or_else(|| "-".to_string()),
                ]
            })
            .collect()
    }
}

fn calculate_column_widths(format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
    format
        .columns
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let content = rows
                .iter()
                .filter_map(|row| row.get(idx))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0);
            content
                .max(col.min_width)
                .max(col.header.len())
                .min(col.max_width.max(col.header.len()))
        })
        .collect()
}

fn create_row(data: &[String], widths: &[usize], format: &TableFormat) -> String {
    let mut row = String::new();

    if format.show_borders {
        row.push('|');
    }

    for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
        let alignment = format
            .columns
            .get(idx)
            .map(|c| &c.alignment)
            .unwrap_or(&Alignment::Left);

        if format.show_borders {
            row.push(' ');
        }
        row.push_str(&align_text(cell, width, alignment));
        if format.show_borders {
            row.push_str(" |");
        } else {
            row.push_str("  ");
        }
    }

    row.trim_end().to_string()
}

fn create_horizontal_border(widths: &[usize]) -> String {
    let mut border = String::new();

    if !widths.is_empty() {
        border.push('+');
        for &width in widths {
            border.push_str(&"-".repeat(width + 2));
            border.push('+');
        }
    }

    border
}

fn align_text(text: &str, width: usize, alignment: &Alignment) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }

    let padding = width - len;
    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
        Alignment::Right => format!("{}{}", " ".repeat(padding), text),
        Alignment::Center => {
            let left_pad = padding / 2;
            format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(padding - left_pad))
        }
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);

        writeln!(output, "{}", border).map_err(fmt_error)?;
        writeln!(output, "  {}  ", title).map_err(fmt_error)?;
        write!(output, "{}", border).map_err(fmt_error)?;

        Ok(output)
    }

    fn format_event(&self, event: &SpeedTestEvent) -> Result<Option<String>> {
        let line = match event {
            SpeedTestEvent::PhaseStarted { phase } => Some(format!("[{}] started", phase)),
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
                    "[{}] {} after {} ({})",
                    phase,
                    format_mbps(*speed_mbps),
                    format_seconds(sample.elapsed_seconds),
                    format_bytes(sample.bytes)
                );
                if let Some(percent) = progress_percent {
                    write!(line, " {:.0}%", percent).map_err(fmt_error)?;
                }
                Some(line)
            }
            SpeedTestEvent::PhaseCompleted { phase, measurement } => Some(format!(
                "[{}] {} in {}",
                phase,
                describe_measurement(measurement),
                format_seconds(measurement.duration_seconds)
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

        writeln!(output, "Run Summary:").map_err(fmt_error)?;
        writeln!(output, "------------").map_err(fmt_error)?;

        let latency = run
            .latency_ms()
            .map(|ms| format!("{} ms", ms))
            .unwrap_or_else(|| "unavailable".to_string());
        writeln!(output, "Latency:   {}", latency).map_err(fmt_error)?;

        if let Some(ref download) = run.download {
            write!(output, "Download:  {}", format_mbps(download.speed_mbps)).map_err(fmt_error)?;
            if let Some(peak) = download.peak_mbps {
                write!(output, " (peak {})", format_mbps(peak)).map_err(fmt_error)?;
            }
            writeln!(output, " - {}", SpeedLevel::from_mbps(download.speed_mbps).description())
                .map_err(fmt_error)?;
        }

        if let Some(ref upload) = run.upload {
            writeln!(
                output,
                "Upload:    {} - {}",
                format_mbps(upload.speed_mbps),
                SpeedLevel::from_mbps(upload.speed_mbps).description()
            )
            .map_err(fmt_error)?;
        }

        if let Some(duration) = run.total_duration() {
            write!(
                output,
                "Duration:  {}",
                format_seconds(duration.num_milliseconds() as f64 / 1000.0)
            )
            .map_err(fmt_error)?;
        }

        Ok(output.trim_end().to_string())
    }

    fn format_history(&self, history: &RunHistory) -> Result<String> {
        if history.is_empty() {
            return Ok("No completed runs.".to_string());
        }

        let mut output = self.create_table(&self.history_table_format(), &Self::history_rows(history));

        if history.len() > 1 {
            output.push('\n');
            if let Some(avg) = history.average_download_mbps() {
                writeln!(output, "Average download: {}", format_mbps(avg)).map_err(fmt_error)?;
            }
            if let Some(avg) = history.average_upload_mbps() {
                write!(output, "Average upload:   {}", format_mbps(avg)).map_err(fmt_error)?;
            }
        }

        Ok(output.trim_end().to_string())
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::FailureReason;
    use crate::models::{DownloadResult, LatencyReport, Sample, UploadResult};

    pub(crate) fn completed_run() -> TestRun {
        let mut run = TestRun::new();
        run.record(Measurement::from(&LatencyReport {
            latency_ms: 23,
            samples_ms: vec![20.0, 23.0, 40.0],
            attempts: 3,
            duration_seconds: 0.4,
        }))
        .unwrap();
        run.record(Measurement::from(&DownloadResult {
            speed_mbps: 48.2,
            peak_mbps: 61.0,
            successful_sources: 2,
            attempted_sources: 2,
            total_bytes: 30_000_000,
            duration_seconds: 5.0,
            sample_count: 40,
        }))
        .unwrap();
        run.record(Measurement::from(&UploadResult {
            speed_mbps: 120.0,
            duration_seconds: 2.0,
            uploaded_bytes: 5 * 1024 * 1024,
            chunk_count: 80,
            failed_chunks: 0,
            sample_count: 20,
        }))
        .unwrap();
        run.complete().unwrap();
        run
    }

    fn plain(verbose: bool) -> PlainFormatter {
        PlainFormatter::new(FormattingOptions {
            enable_color: false,
            verbose_mode: verbose,
            table_borders: true,
        })
    }

    #[test]
    fn test_unit_helpers() {
        assert_eq!(format_seconds(0.25), "250ms");
        assert_eq!(format_seconds(12.44), "12.4s");
        assert_eq!(format_seconds(63.0), "1m3.0s");
        assert_eq!(format_mbps(48.2), "48.20 Mbps");
        assert_eq!(format_mbps(250.4), "250 Mbps");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(65_536), "64.0 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn test_header() {
        let header = plain(false).format_header("Speed Test").unwrap();
        assert_eq!(header, "==============\n  Speed Test  \n==============");
    }

    #[test]
    fn test_progress_only_in_verbose_mode() {
        let event = SpeedTestEvent::Progress {
            phase: Phase::Upload,
            sample: Sample::new(0.5, 65_536),
            speed_mbps: 1.05,
            progress_percent: Some(25.0),
        };
        assert_eq!(plain(false).format_event(&event).unwrap(), None);
        assert_eq!(
            plain(true).format_event(&event).unwrap().as_deref(),
            Some("[upload] 1.05 Mbps after 500ms (64.0 KiB) 25%")
        );
    }

    #[test]
    fn test_phase_and_failure_events() {
        let formatter = plain(false);
        let started = SpeedTestEvent::PhaseStarted { phase: Phase::Ping };
        assert_eq!(formatter.format_event(&started).unwrap().as_deref(), Some("[ping] started"));

        let run = completed_run();
        let completed = SpeedTestEvent::PhaseCompleted {
            phase: Phase::Ping,
            measurement: run.ping.clone().unwrap(),
        };
        assert_eq!(
            formatter.format_event(&completed).unwrap().as_deref(),
            Some("[ping] 23 ms in 400ms")
        );

        let failed = SpeedTestEvent::RunFailed {
            reason: FailureReason::Timeout,
            message: "watchdog fired".to_string(),
        };
        let line = formatter.format_event(&failed).unwrap().unwrap();
        assert!(line.starts_with("ERROR: run failed (timeout)"));

        let done = SpeedTestEvent::RunCompleted { test_run: run };
        assert_eq!(formatter.format_event(&done).unwrap(), None);
    }

    #[test]
    fn test_run_summary() {
        let summary = plain(false).format_run_summary(&completed_run()).unwrap();
        assert!(summary.contains("Latency:   23 ms"));
        assert!(summary.contains("Download:  48.20 Mbps (peak 61.00 Mbps) - Fair"));
        assert!(summary.contains("Upload:    120 Mbps - Excellent"));
        assert!(summary.contains("Duration:"));
    }

    #[test]
    fn test_history_table() {
        let formatter = plain(false);
        let mut history = RunHistory::new(3);
        assert_eq!(formatter.format_history(&history).unwrap(), "No completed runs.");

        history.push(completed_run());
        history.push(completed_run());
        let table = formatter.format_history(&history).unwrap();

        assert!(table.starts_with('+'));
        assert!(table.contains("| Started"));
        assert!(table.contains("Download"));
        assert!(table.contains("48.20 Mbps"));
        assert!(table.contains("Average download: 48.20 Mbps"));
        assert!(table.contains("Average upload:   120 Mbps"));
    }

    #[test]
    fn test_borderless_table_alignment() {
        let format = TableFormat {
            columns: vec![
                Column::new("Name", Alignment::Left, 6, 10),
                Column::new("Value", Alignment::Right, 5, 8),
            ],
            show_borders: false,
        };
        let table = plain(false).create_table(&format, &[vec!["a".to_string(), "1".to_string()]]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Name    Value");
        assert_eq!(lines[1], "a           1");
    }
}
