//! # Domain Errors

use shared_types::NodeId;
use thiserror::Error;

/// Catch-up failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatchUpError {
    /// A batch failed verification and was discarded.
    #[error("Batch from {peer} rejected: {reason}")]
    VerificationFailure {
        /// Peer that served the batch
        peer: NodeId,
        /// What failed
        reason: String,
    },

    /// Too few peers answered health probes (partition).
    #[error("Only {got} peers answered, {required} required")]
    InsufficientPeers {
        /// Peers that answered
        got: usize,
        /// Peers needed for a quorum with this node
        required: usize,
    },

    /// No reachable peer covers the range.
    #[error("No peer serves [{from}, {to})")]
    NoSource {
        /// First index wanted
        from: u64,
        /// End of range (exclusive)
        to: u64,
    },

    /// A peer could not be reached while fetching.
    #[error("Fetch from {peer} failed: {reason}")]
    FetchFailed {
        /// Peer asked
        peer: NodeId,
        /// Transport failure
        reason: String,
    },

    /// The configured round bound was exhausted.
    #[error("Not caught up after {rounds} rounds (height {height}, target {target})")]
    ConvergenceExceeded {
        /// Rounds spent
        rounds: u32,
        /// Local height reached
        height: u64,
        /// Last known target
        target: u64,
    },

    /// Node halted; catch-up no longer runs.
    #[error("Node halted")]
    Halted,
}

impl CatchUpError {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::VerificationFailure { .. } => "rejected",
            Self::InsufficientPeers { .. } => "partitioned",
            Self::NoSource { .. } => "no_source",
            Self::FetchFailed { .. } => "unreachable",
            Self::ConvergenceExceeded { .. } => "exceeded",
            Self::Halted => "halted",
        }
    }
}
