//! Error types for the core library.

use std::time::Duration;

use msgbridge_msg::{ParseError, ValidationError};
use thiserror::Error;

use crate::pipeline::Stage;

/// Errors raised while loading configuration or touching the local system.
#[derive(Debug, Error)]
pub enum Error {
    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Parsing or rendering faults that are not validation failures.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The container could not be interpreted.
    #[error("Failed to parse MSG file: {0}")]
    Parse(#[from] ParseError),

    /// The inbound content stream failed before it was fully read.
    #[error("Failed to read input: {0}")]
    Read(#[source] std::io::Error),
}

/// Faults at the storage boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Upload target already exists.
    #[error("'{name}' already exists in '{container}'")]
    AlreadyExists {
        /// Container name.
        container: String,
        /// Item name.
        name: String,
    },

    /// Item does not exist.
    #[error("'{name}' not found in '{container}'")]
    NotFound {
        /// Container name.
        container: String,
        /// Item name.
        name: String,
    },

    /// Item name cannot be stored by this backend.
    #[error("Invalid item name: '{0}'")]
    InvalidName(String),

    /// Copy succeeded but deleting the source failed; the item now exists in
    /// both containers.
    #[error("Moved '{name}' from '{container}' but could not delete the source: {source}")]
    PartialMove {
        /// Source container.
        container: String,
        /// Source item name.
        name: String,
        /// Delete failure.
        #[source]
        source: Box<StorageError>,
    },

    /// I/O failure in the backend.
    #[error("Storage I/O error during {op} of '{name}': {source}")]
    Io {
        /// Operation that failed.
        op: &'static str,
        /// Item name.
        name: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Backend-specific failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Failure of one pipeline invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input failed structural validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Input could not be converted.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The wall-clock budget ran out.
    #[error("Processing exceeded the {}s budget ({:.2}s elapsed at the {stage} checkpoint)", .budget.as_secs(), .elapsed.as_secs_f64())]
    Timeout {
        /// Checkpoint at which the budget was found exhausted.
        stage: Stage,
        /// Elapsed time at that checkpoint.
        elapsed: Duration,
        /// Configured budget.
        budget: Duration,
    },

    /// Upload or archive failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PipelineError {
    /// Stable machine-readable failure kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conversion(_) => "conversion",
            Self::Timeout { .. } => "timeout",
            Self::Storage(_) => "storage",
        }
    }

    /// Returns true if this failure sends the source item to quarantine.
    ///
    /// Storage failures on the success path never do: the backend is
    /// assumed unreliable for further writes.
    #[must_use]
    pub const fn quarantines(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_kinds() {
        let validation = PipelineError::from(ValidationError::Empty);
        assert_eq!(validation.kind(), "validation");
        assert!(validation.quarantines());
        assert_eq!(validation.to_string(), "MSG file is empty");

        let storage = PipelineError::from(StorageError::Backend("down".into()));
        assert_eq!(storage.kind(), "storage");
        assert!(!storage.quarantines());
    }

    #[test]
    fn test_timeout_message() {
        let err = PipelineError::Timeout {
            stage: Stage::Read,
            elapsed: Duration::from_millis(31_500),
            budget: Duration::from_secs(30),
        };
        assert_eq!(err.kind(), "timeout");
        assert_eq!(
            err.to_string(),
            "Processing exceeded the 30s budget (31.50s elapsed at the read checkpoint)"
        );
    }

    #[test]
    fn test_conversion_error_wraps_cause() {
        let err = ConversionError::from(ParseError::ChainCycle(3));
        assert!(err.to_string().contains("Sector chain starting at 3"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
