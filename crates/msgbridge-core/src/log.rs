//! Conversion event sinks.
//!
//! The pipeline never logs through a global. It is handed an
//! `Arc<dyn ConversionLog>` and reports every event to it; sinks must accept
//! concurrent writers.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::StorageError;
use crate::pipeline::{ConversionReport, Stage};

/// Target used by [`TracingLog`].
pub const LOG_TARGET: &str = "msgbridge::conversion";

/// Receives the events of pipeline invocations.
pub trait ConversionLog: Send + Sync {
    /// An invocation started.
    fn started(&self, filename: &str, size_bytes: u64);

    /// A checkpoint passed within budget.
    fn checkpoint(&self, filename: &str, stage: Stage, elapsed: Duration);

    /// Attachments were found and will not be rendered.
    fn attachments_dropped(&self, filename: &str, count: usize);

    /// The rendered document was uploaded.
    fn uploaded(&self, filename: &str, url: &str);

    /// The source was moved to the archive area.
    fn archived(&self, filename: &str, archive_name: &str);

    /// The source was moved to the failed area.
    fn quarantined(&self, filename: &str, quarantine_name: &str);

    /// Moving the source to the failed area failed. Never fatal.
    fn quarantine_failed(&self, filename: &str, error: &StorageError);

    /// The invocation finished, successfully or not.
    fn finished(&self, report: &ConversionReport);
}

/// Sink emitting `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl ConversionLog for TracingLog {
    fn started(&self, filename: &str, size_bytes: u64) {
        info!(target: LOG_TARGET, filename, size_bytes, "Processing MSG file");
    }

    #[allow(clippy::cast_possible_truncation)]
    fn checkpoint(&self, filename: &str, stage: Stage, elapsed: Duration) {
        debug!(
            target: LOG_TARGET,
            filename,
            stage = stage.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Checkpoint passed"
        );
    }

    fn attachments_dropped(&self, filename: &str, count: usize) {
        warn!(
            target: LOG_TARGET,
            filename,
            attachments = count,
            "Attachments are not carried into the EML output"
        );
    }

    fn uploaded(&self, filename: &str, url: &str) {
        info!(target: LOG_TARGET, filename, output_url = url, "Uploaded EML file");
    }

    fn archived(&self, filename: &str, archive_name: &str) {
        info!(target: LOG_TARGET, filename, archive_name, "Archived original MSG file");
    }

    fn quarantined(&self, filename: &str, quarantine_name: &str) {
        warn!(target: LOG_TARGET, filename, quarantine_name, "Moved failed file to quarantine");
    }

    fn quarantine_failed(&self, filename: &str, err: &StorageError) {
        error!(
            target: LOG_TARGET,
            filename,
            error = %err,
            "Could not move failed file to quarantine"
        );
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn finished(&self, report: &ConversionReport) {
        let elapsed_ms = (report.duration_seconds * 1000.0) as u64;
        if report.is_success() {
            info!(
                target: LOG_TARGET,
                filename = %report.filename,
                input_size = report.input_size,
                output_size = report.output_size,
                elapsed_ms,
                output_url = report.output_url.as_deref(),
                "Conversion succeeded"
            );
        } else {
            error!(
                target: LOG_TARGET,
                filename = %report.filename,
                input_size = report.input_size,
                elapsed_ms,
                kind = report.failure_kind,
                error = report.error.as_deref(),
                quarantine = ?report.quarantine,
                "Conversion failed"
            );
        }
    }
}

/// Sink that records events in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    events: Mutex<Vec<String>>,
    reports: Mutex<Vec<ConversionReport>>,
}

impl MemoryLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, one short line each.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded reports.
    #[must_use]
    pub fn reports(&self) -> Vec<ConversionReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, event: String) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl ConversionLog for MemoryLog {
    fn started(&self, filename: &str, size_bytes: u64) {
        self.push(format!("started {filename} {size_bytes}"));
    }

    fn checkpoint(&self, filename: &str, stage: Stage, _elapsed: Duration) {
        self.push(format!("checkpoint {filename} {stage}"));
    }

    fn attachments_dropped(&self, filename: &str, count: usize) {
        self.push(format!("attachments_dropped {filename} {count}"));
    }

    fn uploaded(&self, filename: &str, url: &str) {
        self.push(format!("uploaded {filename} {url}"));
    }

    fn archived(&self, filename: &str, archive_name: &str) {
        self.push(format!("archived {filename} {archive_name}"));
    }

    fn quarantined(&self, filename: &str, quarantine_name: &str) {
        self.push(format!("quarantined {filename} {quarantine_name}"));
    }

    fn quarantine_failed(&self, filename: &str, error: &StorageError) {
        self.push(format!("quarantine_failed {filename} {error}"));
    }

    fn finished(&self, report: &ConversionReport) {
        self.push(format!("finished {}", report.filename));
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
    }
}
