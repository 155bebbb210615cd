//! # Domain Errors
//!
//! Only [`LogError::InvariantViolation`] is fatal for the node; everything
//! else is an I/O or decoding problem reported to the caller.

use thiserror::Error;

/// Replication log failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    /// Append at an index other than the current height.
    #[error("Log invariant violated: expected index {expected}, got {got}")]
    InvariantViolation { expected: u64, got: u64 },

    /// Durable records are not contiguous from zero.
    #[error("Stored log is discontinuous: expected index {expected}, found {found}")]
    Discontinuous { expected: u64, found: u64 },

    /// A complete record failed its checksum or could not be decoded.
    #[error("Corrupted record at byte offset {offset}: {reason}")]
    Corrupted { offset: u64, reason: String },

    /// Encoding failure.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(String),
}

impl LogError {
    /// Whether the node must stop writing.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvariantViolation { .. } | Self::Discontinuous { .. } | Self::Corrupted { .. }
        )
    }
}

impl From<std::io::Error> for LogError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
