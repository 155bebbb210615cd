//! Error types for the consensus engine.

use shared_types::ValidationError;

/// Why a submitted operation did not commit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsensusError {
    #[error("Operation rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("No quorum after {attempts} rounds")]
    QuorumTimeout { attempts: u32 },

    #[error("Cannot reach a quorum of caught-up members")]
    PartitionStall,

    #[error("Node halted after a log invariant violation")]
    Halted,

    #[error("Proposal driver stopped")]
    Shutdown,
}

impl ConsensusError {
    /// Short label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::QuorumTimeout { .. } => "quorum_timeout",
            Self::PartitionStall => "partition_stall",
            Self::Halted => "halted",
            Self::Shutdown => "shutdown",
        }
    }
}
