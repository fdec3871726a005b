//! Run statistics and the final summary table.
//!
//! Counters are accumulated by the orchestrator per window, record and asset.
//! The summary is printed as a table on a TTY and as log lines otherwise.

use std::fmt;
use std::time::Duration;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use indicatif::HumanBytes;
use recfetch_core::{FetchError, fmt_num};

/// Unit of work a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    Window,
    Record,
    Asset,
}

impl fmt::Display for FailureScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Window => "window",
            Self::Record => "record",
            Self::Asset => "asset",
        })
    }
}

/// One failed unit of work, kept for the summary
#[derive(Debug, Clone)]
pub struct Failure {
    pub scope: FailureScope,
    pub label: String,
    /// Short error class, see [`FetchError::kind`]
    pub kind: &'static str,
    pub message: String,
}

impl Failure {
    pub fn new(scope: FailureScope, label: impl Into<String>, error: &FetchError) -> Self {
        Self {
            scope,
            label: label.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Result of one asset job
#[derive(Debug)]
pub struct AssetOutcome {
    pub label: String,
    pub result: Result<u64, FetchError>,
    pub elapsed: Duration,
}

impl AssetOutcome {
    /// Log completion (non-TTY mode only).
    pub fn log(&self) {
        match &self.result {
            Ok(bytes) => log::info!(
                "{}: {} [{:.1}s]",
                self.label,
                HumanBytes(*bytes),
                self.elapsed.as_secs_f64()
            ),
            Err(e) if e.is_cancelled() => log::debug!("{}: cancelled", self.label),
            Err(e) => log::error!("{}: {e}", self.label),
        }
    }
}

/// Summary of a pipeline run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub windows_planned: usize,
    pub windows_failed: usize,
    pub records_listed: usize,
    pub records_failed: usize,
    pub assets_completed: usize,
    /// Assets without a remote location
    pub assets_skipped: usize,
    pub assets_failed: usize,
    pub bytes_written: u64,
    pub elapsed: Duration,
    pub cancelled: bool,
    pub failures: Vec<Failure>,
}

impl RunSummary {
    pub fn new(windows_planned: usize) -> Self {
        Self {
            windows_planned,
            ..Default::default()
        }
    }

    pub fn add_asset(&mut self, outcome: &AssetOutcome) {
        match &outcome.result {
            Ok(bytes) => {
                self.assets_completed += 1;
                self.bytes_written += bytes;
            }
            Err(e) if e.is_cancelled() => self.cancelled = true,
            Err(e) => {
                self.assets_failed += 1;
                self.failures
                    .push(Failure::new(FailureScope::Asset, &outcome.label, e));
            }
        }
    }

    pub fn add_record_failure(&mut self, label: &str, error: &FetchError) {
        self.records_failed += 1;
        self.failures
            .push(Failure::new(FailureScope::Record, label, error));
    }

    pub fn add_window_failure(&mut self, label: &str, error: &FetchError) {
        if error.is_cancelled() {
            self.cancelled = true;
            return;
        }
        self.windows_failed += 1;
        self.failures
            .push(Failure::new(FailureScope::Window, label, error));
    }

    /// Whether any window could not be listed
    pub fn has_window_failures(&self) -> bool {
        self.windows_failed > 0
    }

    /// Whether anything at all failed
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Format summary table as a string.
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Recordings")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
            ]);

        table.add_row(vec![
            Cell::new("Windows"),
            Cell::new(format!(
                "{} ({} failed)",
                self.windows_planned, self.windows_failed
            )),
        ]);
        table.add_row(vec![
            Cell::new("Records"),
            Cell::new(format!(
                "{} ({} failed)",
                fmt_num(self.records_listed),
                self.records_failed
            )),
        ]);
        table.add_row(vec![
            Cell::new("Assets completed").fg(Color::Green),
            Cell::new(fmt_num(self.assets_completed)).fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("Assets skipped"),
            Cell::new(fmt_num(self.assets_skipped)),
        ]);
        let failed = Cell::new(fmt_num(self.assets_failed));
        table.add_row(vec![
            Cell::new("Assets failed"),
            if self.assets_failed > 0 {
                failed.fg(Color::Red)
            } else {
                failed
            },
        ]);
        table.add_row(vec![
            Cell::new("Bytes written"),
            Cell::new(HumanBytes(self.bytes_written).to_string()),
        ]);
        table.add_row(vec![
            Cell::new("Time"),
            Cell::new(format!("{:.1}s", self.elapsed.as_secs_f64())),
        ]);

        let mut out = format!("\n{table}");
        if !self.failures.is_empty() {
            let mut failures = Table::new();
            failures
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Failed").fg(Color::Red),
                    Cell::new("Kind").fg(Color::Red),
                    Cell::new("Error").fg(Color::Red),
                ]);
            for f in &self.failures {
                failures.add_row(vec![
                    Cell::new(format!("{} {}", f.scope, f.label)),
                    Cell::new(f.kind),
                    Cell::new(&f.message),
                ]);
            }
            out.push_str(&format!("\n{failures}"));
        }
        out
    }

    /// Log summary (non-TTY mode).
    pub fn log(&self) {
        log::info!("=== Run Summary ===");
        log::info!(
            "Windows: {} ({} failed)",
            self.windows_planned,
            self.windows_failed
        );
        log::info!(
            "Records: {} ({} failed)",
            fmt_num(self.records_listed),
            self.records_failed
        );
        log::info!(
            "Assets: {} completed, {} skipped, {} failed",
            fmt_num(self.assets_completed),
            fmt_num(self.assets_skipped),
            fmt_num(self.assets_failed)
        );
        log::info!(
            "Written: {} in {:.1}s",
            HumanBytes(self.bytes_written),
            self.elapsed.as_secs_f64()
        );
        for f in &self.failures {
            log::warn!("Failed {} {}: [{}] {}", f.scope, f.label, f.kind, f.message);
        }
        if self.cancelled {
            log::warn!("Run was cancelled before completion");
        }
    }
}
