//! Driven ports (outbound SPI).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::{ContentDigest, Identity, NodeId, Operation, SyncState, ValidationError};
use thiserror::Error;
use tokio::sync::watch;

/// Why a submission did not commit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// A quorum rejected the operation.
    #[error(transparent)]
    Rejected(#[from] ValidationError),

    /// Retries exhausted without a quorum.
    #[error("No quorum after {attempts} attempts")]
    QuorumTimeout { attempts: u32 },

    /// Node is stalled, halted, or shutting down.
    #[error("{0}")]
    Unavailable(String),
}

/// Hands operations to consensus.
#[async_trait]
pub trait ProposalSubmitter: Send + Sync {
    /// Queue `operation` and wait for the log index it committed at.
    ///
    /// Dropping the returned future must not withdraw the proposal.
    async fn submit(&self, operation: Operation) -> Result<u64, SubmitError>;
}

/// Node-level status the client interface reports.
pub trait NodeStatus: Send + Sync {
    fn node_id(&self) -> NodeId;

    /// Catch-up state.
    fn sync_state(&self) -> SyncState;

    /// Applied height, updated after every commit.
    fn applied_heights(&self) -> watch::Receiver<u64>;
}

/// Public URL derivation.
pub trait LocatorDeriver: Send + Sync {
    fn url_for(&self, name: &str, owner: &Identity) -> String;
}

/// Where bundle storage keeps a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationToken(pub String);

/// Bundle storage failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BundleError {
    #[error("Bundle {0} is not available")]
    Missing(ContentDigest),

    #[error("Bundle store failed: {0}")]
    Store(String),
}

/// Bundle storage collaborator.
#[async_trait]
pub trait BundleStore: Send + Sync {
    /// Make sure the bundle with `digest` is stored and servable.
    async fn store_bundle(&self, digest: &ContentDigest) -> Result<LocationToken, BundleError>;
}
