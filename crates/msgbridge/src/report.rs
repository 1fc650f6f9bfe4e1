//! JSON report output.

use std::io::Write;
use std::time::Duration;

use msgbridge_core::log::ConversionLog;
use msgbridge_core::{ConversionReport, Stage, StorageError};

/// Log sink that also prints every report as a JSON line on stdout.
#[derive(Debug)]
pub struct JsonReportLog<L> {
    inner: L,
}

impl<L: ConversionLog> JsonReportLog<L> {
    /// Wraps `inner`, which still receives every event.
    pub const fn new(inner: L) -> Self {
        Self { inner }
    }
}

impl<L: ConversionLog> ConversionLog for JsonReportLog<L> {
    fn started(&self, filename: &str, size_bytes: u64) {
        self.inner.started(filename, size_bytes);
    }

    fn checkpoint(&self, filename: &str, stage: Stage, elapsed: Duration) {
        self.inner.checkpoint(filename, stage, elapsed);
    }

    fn attachments_dropped(&self, filename: &str, count: usize) {
        self.inner.attachments_dropped(filename, count);
    }

    fn uploaded(&self, filename: &str, url: &str) {
        self.inner.uploaded(filename, url);
    }

    fn archived(&self, filename: &str, archive_name: &str) {
        self.inner.archived(filename, archive_name);
    }

    fn quarantined(&self, filename: &str, quarantine_name: &str) {
        self.inner.quarantined(filename, quarantine_name);
    }

    fn quarantine_failed(&self, filename: &str, error: &StorageError) {
        self.inner.quarantine_failed(filename, error);
    }

    fn finished(&self, report: &ConversionReport) {
        self.inner.finished(report);

        let line = match serde_json::to_string(report) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to serialize report for {}: {}", report.filename, e);
                return;
            }
        };
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{line}") {
            tracing::warn!("Failed to write report for {}: {}", report.filename, e);
        }
    }
}
