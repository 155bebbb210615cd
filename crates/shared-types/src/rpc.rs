//! # Peer RPC Contract
//!
//! Messages exchanged between registry peers and the [`PeerRpc`] trait every
//! transport implements.
//!
//! ## Messages
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | Prepare | `PrepareRequest{index, ballot}` | `Promise` |
//! | Propose | `ProposeRequest{index, round, operation, proposer, timestamp}` | `Vote` |
//! | Commit | `CommitRequest{certified}` | `CommitAck` |
//! | FetchEntries | `FetchEntriesRequest{from_index, to_index}` | `FetchEntriesResponse` |
//! | Health | - | `HealthResponse` |
//!
//! Peers never share memory; these messages are the only coupling.

use crate::certificate::CertifiedEntry;
use crate::entities::{Ballot, Digest, LogEntry, NodeId, Operation, SignatureBytes, SyncState};
use crate::errors::{TransportError, ValidationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Why a voter refused a prepare or propose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Operation fails validation at the voter's height.
    Validation(ValidationError),
    /// Voter already promised a higher ballot for this index.
    StaleBallot { promised: Ballot },
    /// Index is already committed at the voter; the proposer is behind.
    AlreadyCommitted { committed_height: u64 },
    /// Voter has not applied up to the index yet.
    VoterBehind { committed_height: u64 },
    /// Voter is syncing or cut off from a quorum.
    NotCaughtUp,
    /// Proposer is not in the voter's configuration.
    NotAMember,
    /// Voter stopped after an invariant violation.
    Halted,
}

/// Phase one request: reserve `index` for `ballot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub index: u64,
    pub ballot: Ballot,
}

/// A proposal a voter already accepted for an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedProposal {
    pub ballot: Ballot,
    pub entry: LogEntry,
}

/// Answer to [`PrepareRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promise {
    pub from: NodeId,
    pub granted: bool,
    pub reason: Option<RejectReason>,
    /// Highest-ballot proposal this voter accepted for the index.
    pub accepted: Option<AcceptedProposal>,
    pub committed_height: u64,
}

/// Phase two request: accept one entry for `index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposeRequest {
    pub index: u64,
    pub round: u64,
    pub operation: Operation,
    pub proposer: NodeId,
    pub timestamp: u64,
}

impl ProposeRequest {
    /// Request carrying `entry`.
    pub fn from_entry(entry: &LogEntry) -> Self {
        Self {
            index: entry.index,
            round: entry.round,
            operation: entry.operation.clone(),
            proposer: entry.proposer,
            timestamp: entry.timestamp,
        }
    }

    /// The log entry being proposed.
    pub fn to_entry(&self) -> LogEntry {
        LogEntry {
            index: self.index,
            round: self.round,
            proposer: self.proposer,
            timestamp: self.timestamp,
            operation: self.operation.clone(),
        }
    }

    /// The proposal's ballot.
    pub fn ballot(&self) -> Ballot {
        Ballot::new(self.round, self.proposer)
    }
}

/// Answer to [`ProposeRequest`].
///
/// An accepting vote carries the voter's signature over the entry digest;
/// a rejecting vote carries the reason instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter: NodeId,
    pub accept: bool,
    pub reason: Option<RejectReason>,
    pub signature: Option<SignatureBytes>,
    pub committed_height: u64,
}

/// Announcement of a committed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub certified: CertifiedEntry,
}

/// Answer to [`CommitRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAck {
    pub accepted: bool,
    pub committed_height: u64,
    pub reason: Option<String>,
}

/// Range request for catch-up: `[from_index, to_index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchEntriesRequest {
    pub from_index: u64,
    pub to_index: u64,
}

/// Certified entries in index order, possibly fewer than requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchEntriesResponse {
    pub entries: Vec<CertifiedEntry>,
    pub committed_height: u64,
}

/// A peer's self-reported progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub node_id: NodeId,
    pub committed_height: u64,
    pub state: SyncState,
    pub config_version: u64,
    /// Digest of the peer's genesis configuration.
    pub genesis_hash: Digest,
}

/// Client side of the peer protocol.
///
/// Implemented by transports (in-process, HTTP) and by the node itself for
/// inbound dispatch.
#[async_trait]
pub trait PeerRpc: Send + Sync {
    /// Phase one.
    async fn prepare(&self, request: PrepareRequest) -> Result<Promise, TransportError>;

    /// Phase two.
    async fn propose(&self, request: ProposeRequest) -> Result<Vote, TransportError>;

    /// Deliver a certified entry.
    async fn commit(&self, request: CommitRequest) -> Result<CommitAck, TransportError>;

    /// Read a range of certified entries.
    async fn fetch_entries(
        &self,
        request: FetchEntriesRequest,
    ) -> Result<FetchEntriesResponse, TransportError>;

    /// Report progress.
    async fn health(&self) -> Result<HealthResponse, TransportError>;
}
