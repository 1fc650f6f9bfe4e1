//! Error types for MSG validation and parsing.

use thiserror::Error;

/// Result type alias for MSG operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structural problems found before any parsing takes place.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Input has no bytes at all.
    #[error("MSG file is empty")]
    Empty,

    /// Input exceeds the configured size limit.
    #[error("File size {actual_mb:.2} MB exceeds maximum allowed size of {max_mb} MB")]
    TooLarge {
        /// Actual size in MiB.
        actual_mb: f64,
        /// Configured maximum in MiB.
        max_mb: u64,
    },

    /// Input is shorter than the signature.
    #[error("File is too small to be a valid MSG file ({len} bytes)")]
    TooSmall {
        /// Input length in bytes.
        len: usize,
    },

    /// First eight bytes are not the compound document signature.
    #[error("Invalid MSG file format: header does not match signature")]
    SignatureMismatch,
}

impl ValidationError {
    /// Stable machine-readable code for this failure.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::TooLarge { .. } => "too_large",
            Self::TooSmall { .. } => "too_small",
            Self::SignatureMismatch => "signature_mismatch",
        }
    }
}

/// Faults while interpreting a compound document or its properties.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Header field has an unsupported or inconsistent value.
    #[error("Invalid compound document header: {0}")]
    Header(String),

    /// A sector index points outside the file.
    #[error("Sector {0} is out of range")]
    SectorOutOfRange(u32),

    /// A sector chain loops back on itself.
    #[error("Sector chain starting at {0} contains a cycle")]
    ChainCycle(u32),

    /// Directory structure is malformed.
    #[error("Invalid directory: {0}")]
    Directory(String),

    /// A stream is shorter than its declared size.
    #[error("Stream '{name}' is truncated: expected {expected} bytes, found {found}")]
    Truncated {
        /// Stream name.
        name: String,
        /// Declared size.
        expected: u64,
        /// Bytes actually available.
        found: usize,
    },

    /// The container does not look like a mail message.
    #[error("Not a mail message: {0}")]
    NotAMessage(String),

    /// Property stream could not be decoded.
    #[error("Invalid property stream: {0}")]
    Property(String),
}

/// Errors returned by [`crate::MessageParser::parse`].
///
/// Validation failures are kept apart from parse failures so callers can
/// route them differently.
#[derive(Debug, Error)]
pub enum Error {
    /// The input failed structural validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The input passed validation but could not be interpreted.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        assert!(ValidationError::Empty.to_string().contains("empty"));
        assert!(
            ValidationError::TooSmall { len: 3 }
                .to_string()
                .contains("too small")
        );
        assert!(
            ValidationError::SignatureMismatch
                .to_string()
                .contains("header does not match signature")
        );
        let too_large = ValidationError::TooLarge {
            actual_mb: 30.0,
            max_mb: 25,
        };
        assert_eq!(
            too_large.to_string(),
            "File size 30.00 MB exceeds maximum allowed size of 25 MB"
        );
    }

    #[test]
    fn test_validation_kinds() {
        assert_eq!(ValidationError::Empty.kind(), "empty");
        assert_eq!(ValidationError::SignatureMismatch.kind(), "signature_mismatch");
    }
}
