//! # Batch Checks
//!
//! Structural verification of a fetched range before it reaches the
//! single writer. Signature checks happen there, against the
//! configuration in force at each height.

use shared_types::{CertificateError, CertifiedEntry};
use thiserror::Error;

/// Why a batch is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("empty batch")]
    Empty,

    #[error("expected index {expected}, found {found}")]
    Gap { expected: u64, found: u64 },

    #[error("entry {index} outside requested range ending at {to}")]
    OutOfRange { index: u64, to: u64 },

    #[error("certificate does not match entry: {0}")]
    Certificate(#[from] CertificateError),
}

/// Check that `entries` is a contiguous run inside `[from, to)` and that
/// every certificate is bound to its entry.
pub fn verify_batch(entries: &[CertifiedEntry], from: u64, to: u64) -> Result<(), BatchError> {
    if entries.is_empty() {
        return Err(BatchError::Empty);
    }
    for (offset, certified) in entries.iter().enumerate() {
        let expected = from + offset as u64;
        let index = certified.index();
        if index != expected {
            return Err(BatchError::Gap {
                expected,
                found: index,
            });
        }
        if index >= to {
            return Err(BatchError::OutOfRange { index, to });
        }
        certified.certificate.check_binding(&certified.entry)?;
    }
    Ok(())
}
