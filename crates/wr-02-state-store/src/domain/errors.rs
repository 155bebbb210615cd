//! State store errors.
//!
//! Validation failures are not errors of the store: they are returned by
//! `validate` and recorded as rejected entries by `apply`.

use thiserror::Error;

/// State store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// Entry index is past the applied height.
    #[error("Entry out of order: expected index {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },

    /// Snapshot root does not match its contents.
    #[error("State root mismatch at height {height}")]
    RootMismatch { height: u64 },

    /// Snapshot was taken on a cluster with another genesis.
    #[error("Snapshot belongs to a different genesis configuration")]
    GenesisMismatch,

    /// Snapshot encoding failure.
    #[error("Codec error: {0}")]
    Codec(String),
}
