//! # Error Types
//!
//! Errors that cross subsystem or node boundaries. Subsystem-internal errors
//! live in each crate's `domain/errors.rs`.

use crate::entities::{Identity, NodeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an operation cannot be admitted at the current height.
///
/// Voters return these inside a rejecting vote, so the type travels over
/// the wire and every variant must be deterministic given the state.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    /// Name is not a valid DNS label.
    #[error("Malformed name {name:?}: {reason}")]
    MalformedName { name: String, reason: String },

    /// Site description over the size limit.
    #[error("Description too long: {len} bytes, max {max}")]
    DescriptionTooLong { len: usize, max: usize },

    /// Intent signature does not verify against its owner.
    #[error("Invalid intent signature")]
    InvalidSignature,

    /// Deployer is not on the cluster allow-list.
    #[error("Identity {identity} is not allowed to deploy")]
    NotAllowlisted { identity: Identity },

    /// Name belongs to a different identity.
    #[error("Name {name:?} is owned by {owner}")]
    Unauthorized { name: String, owner: Identity },

    /// Version does not exceed the committed one.
    #[error("Stale version for {name:?}: current {current}, proposed {proposed}")]
    StaleVersion {
        name: String,
        current: u64,
        proposed: u64,
    },

    /// Name has no live deployment.
    #[error("Name {name:?} is not deployed")]
    NotFound { name: String },

    /// Proposed cluster configuration is unusable.
    #[error("Invalid cluster configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Proposer is not a member of the current configuration.
    #[error("Node {node} is not a cluster member")]
    NotAMember { node: NodeId },
}

/// Commit certificate verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    /// Certificate index differs from the entry index.
    #[error("Certificate index {certificate} does not match entry index {entry}")]
    IndexMismatch { certificate: u64, entry: u64 },

    /// Certificate ballot differs from the entry's round/proposer.
    #[error("Certificate ballot does not match entry at index {index}")]
    BallotMismatch { index: u64 },

    /// Certified digest is not the digest of the entry.
    #[error("Certificate digest does not match entry at index {index}")]
    DigestMismatch { index: u64 },

    /// Vote from a node outside the configuration.
    #[error("Vote from non-member {voter}")]
    UnknownVoter { voter: NodeId },

    /// Same voter counted twice.
    #[error("Duplicate vote from {voter}")]
    DuplicateVoter { voter: NodeId },

    /// Vote signature does not verify.
    #[error("Bad vote signature from {voter}")]
    BadSignature { voter: NodeId },

    /// Fewer distinct votes than the quorum.
    #[error("Insufficient votes: got {got}, need {required}")]
    InsufficientVotes { got: usize, required: usize },
}

/// Peer RPC failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Peer not reachable (down or partitioned).
    #[error("Peer {0} unreachable")]
    Unreachable(NodeId),

    /// Peer did not answer in time.
    #[error("Request to {0} timed out")]
    Timeout(NodeId),

    /// Peer answered with an error.
    #[error("Peer error: {0}")]
    Remote(String),

    /// Response could not be decoded.
    #[error("Codec error: {0}")]
    Codec(String),
}

/// Hex-encoded identifier could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexParseError {
    /// Not valid hex.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Wrong decoded length.
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
