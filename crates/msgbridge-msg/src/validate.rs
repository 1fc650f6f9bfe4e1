//! Cheap structural checks run before parsing.

use crate::error::ValidationError;

/// Compound document signature (`D0 CF 11 E0 A1 B1 1A E1`).
pub const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Default maximum input size in MiB.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 25;

const MIB: u64 = 1024 * 1024;

/// Validates raw input against size limits and the container signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatValidator {
    max_size_mb: u64,
}

impl Default for FormatValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE_MB)
    }
}

impl FormatValidator {
    /// Creates a validator with the given size limit in MiB.
    #[must_use]
    pub const fn new(max_size_mb: u64) -> Self {
        Self { max_size_mb }
    }

    /// Configured size limit in MiB.
    #[must_use]
    pub const fn max_size_mb(&self) -> u64 {
        self.max_size_mb
    }

    /// Runs the checks in order, stopping at the first failure:
    /// non-empty, size limit, minimum length, signature.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn validate(&self, bytes: &[u8]) -> Result<(), ValidationError> {
        if bytes.is_empty() {
            return Err(ValidationError::Empty);
        }

        let len = bytes.len() as u64;
        if len > self.max_size_mb.saturating_mul(MIB) {
            #[allow(clippy::cast_precision_loss)]
            let actual_mb = len as f64 / MIB as f64;
            return Err(ValidationError::TooLarge {
                actual_mb,
                max_mb: self.max_size_mb,
            });
        }

        if bytes.len() < SIGNATURE.len() {
            return Err(ValidationError::TooSmall { len: bytes.len() });
        }

        if bytes[..SIGNATURE.len()] != SIGNATURE {
            return Err(ValidationError::SignatureMismatch);
        }

        Ok(())
    }
}
