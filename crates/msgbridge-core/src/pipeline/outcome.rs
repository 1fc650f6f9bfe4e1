//! Outcomes, routing decisions and reports.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Containers;
use crate::error::PipelineError;
use crate::storage::naming;

/// Result of running the stages of one invocation.
#[derive(Debug)]
pub enum ConversionOutcome {
    /// Rendered document ready for upload.
    Success {
        /// Encoded document.
        document: Bytes,
        /// Name the document is uploaded under.
        destination_name: String,
    },
    /// Any failure. The variant of the error is the failure state.
    Failure(PipelineError),
}

/// Where the source item goes, derived from a [`ConversionOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Upload the document to the output area and archive the source.
    Deliver,
    /// Move the source to the failed area.
    Quarantine,
    /// Leave the source where it is.
    Hold,
}

impl RoutingDecision {
    /// Routes an outcome.
    #[must_use]
    pub const fn for_outcome(outcome: &ConversionOutcome) -> Self {
        match outcome {
            ConversionOutcome::Success { .. } => Self::Deliver,
            ConversionOutcome::Failure(err) => Self::for_error(err),
        }
    }

    /// Routes a failure, including one raised after the stages succeeded.
    #[must_use]
    pub const fn for_error(err: &PipelineError) -> Self {
        if err.quarantines() {
            Self::Quarantine
        } else {
            Self::Hold
        }
    }

    /// Container the source item is moved to, if any.
    #[must_use]
    pub fn source_container(self, containers: &Containers) -> Option<&str> {
        match self {
            Self::Deliver => Some(&containers.archive),
            Self::Quarantine => Some(&containers.failed),
            Self::Hold => None,
        }
    }

    /// Name the source item is moved under, if it moves.
    #[must_use]
    pub fn source_name(self, name: &str, now: DateTime<Utc>) -> Option<String> {
        match self {
            Self::Deliver => Some(naming::archive_name(name, now)),
            Self::Quarantine => Some(naming::quarantine_name(name, now)),
            Self::Hold => None,
        }
    }
}

/// Result of the best-effort quarantine move.
///
/// Kept apart from the primary failure so that a quarantine problem can
/// never replace it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuarantineOutcome {
    /// No quarantine was attempted.
    NotAttempted,
    /// Source moved to the failed area.
    Moved {
        /// Name in the failed area.
        name: String,
    },
    /// The move failed; the error was logged and suppressed.
    Failed {
        /// Error message.
        error: String,
    },
}

/// Final status of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Converted, uploaded and archived.
    Success,
    /// Validation, conversion or storage failure.
    Failed,
    /// Budget exhausted.
    Timeout,
}

/// Report emitted for every invocation, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionReport {
    /// Source item name.
    pub filename: String,
    /// Declared input size in bytes.
    pub input_size: u64,
    /// Rendered size in bytes, when conversion succeeded.
    pub output_size: Option<usize>,
    /// Wall-clock duration of the invocation.
    pub duration_seconds: f64,
    /// URL of the uploaded document.
    pub output_url: Option<String>,
    /// Final status.
    pub status: Status,
    /// Machine-readable failure kind.
    pub failure_kind: Option<&'static str>,
    /// Failure message.
    pub error: Option<String>,
    /// Quarantine result.
    pub quarantine: QuarantineOutcome,
    /// When the report was produced.
    pub timestamp: DateTime<Utc>,
}

impl ConversionReport {
    /// Report for a delivered item.
    #[must_use]
    pub fn success(
        filename: &str,
        input_size: u64,
        output_size: usize,
        duration: Duration,
        output_url: String,
    ) -> Self {
        Self {
            filename: filename.to_string(),
            input_size,
            output_size: Some(output_size),
            duration_seconds: duration.as_secs_f64(),
            output_url: Some(output_url),
            status: Status::Success,
            failure_kind: None,
            error: None,
            quarantine: QuarantineOutcome::NotAttempted,
            timestamp: Utc::now(),
        }
    }

    /// Report for a failed item.
    #[must_use]
    pub fn failure(
        filename: &str,
        input_size: u64,
        duration: Duration,
        error: &PipelineError,
        quarantine: QuarantineOutcome,
    ) -> Self {
        let status = match error {
            PipelineError::Timeout { .. } => Status::Timeout,
            _ => Status::Failed,
        };
        Self {
            filename: filename.to_string(),
            input_size,
            output_size: None,
            duration_seconds: duration.as_secs_f64(),
            output_url: None,
            status,
            failure_kind: Some(error.kind()),
            error: Some(error.to_string()),
            quarantine,
            timestamp: Utc::now(),
        }
    }

    /// Returns true for successful invocations.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use msgbridge_msg::ValidationError;

    use super::*;
    use crate::error::StorageError;
    use crate::pipeline::Stage;

    #[test]
    fn test_routing() {
        let success = ConversionOutcome::Success {
            document: Bytes::new(),
            destination_name: "a.eml".into(),
        };
        assert_eq!(RoutingDecision::for_outcome(&success), RoutingDecision::Deliver);

        let timeout = ConversionOutcome::Failure(PipelineError::Timeout {
            stage: Stage::Read,
            elapsed: Duration::from_secs(31),
            budget: Duration::from_secs(30),
        });
        assert_eq!(RoutingDecision::for_outcome(&timeout), RoutingDecision::Quarantine);

        let storage =
            ConversionOutcome::Failure(StorageError::Backend("unavailable".into()).into());
        assert_eq!(RoutingDecision::for_outcome(&storage), RoutingDecision::Hold);
    }

    #[test]
    fn test_source_destinations() {
        let containers = Containers::default();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        assert_eq!(
            RoutingDecision::Deliver.source_container(&containers),
            Some("msg-archive")
        );
        assert_eq!(
            RoutingDecision::Deliver.source_name("x.msg", now).as_deref(),
            Some("x_20240102_030405.msg")
        );
        assert_eq!(
            RoutingDecision::Quarantine.source_container(&containers),
            Some("msg-failed")
        );
        assert_eq!(
            RoutingDecision::Quarantine.source_name("x.msg", now).as_deref(),
            Some("x_failed_20240102_030405.msg")
        );
        assert_eq!(RoutingDecision::Hold.source_container(&containers), None);
        assert_eq!(RoutingDecision::Hold.source_name("x.msg", now), None);
    }

    #[test]
    fn test_failure_report_serializes() {
        let error = PipelineError::from(ValidationError::SignatureMismatch);
        let report = ConversionReport::failure(
            "bad.msg",
            50,
            Duration::from_millis(250),
            &error,
            QuarantineOutcome::Moved {
                name: "bad_failed_20240101_000000.msg".into(),
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["filename"], "bad.msg");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["failure_kind"], "validation");
        assert_eq!(json["duration_seconds"], 0.25);
        assert_eq!(json["quarantine"]["status"], "moved");
        assert!(json["output_url"].is_null());
        assert!(
            json["error"]
                .as_str()
                .unwrap()
                .contains("header does not match signature")
        );
    }

    #[test]
    fn test_timeout_report_status() {
        let error = PipelineError::Timeout {
            stage: Stage::Started,
            elapsed: Duration::from_secs(40),
            budget: Duration::from_secs(30),
        };
        let report = ConversionReport::failure(
            "slow.msg",
            10,
            Duration::from_secs(40),
            &error,
            QuarantineOutcome::Failed {
                error: "denied".into(),
            },
        );
        assert_eq!(report.status, Status::Timeout);
        assert!(!report.is_success());
    }
}
