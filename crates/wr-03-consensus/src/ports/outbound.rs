//! Driven ports (outbound dependencies).

use async_trait::async_trait;
use shared_types::{
    CertifiedEntry, ClusterConfig, NodeId, Operation, PeerRpc, SyncState, ValidationError,
};
use std::sync::Arc;
use tokio::sync::watch;

/// The node's applied registry state as the engine sees it.
pub trait RegistryView: Send + Sync {
    /// Number of entries applied locally.
    fn committed_height(&self) -> u64;

    /// Configuration in force at the applied height.
    fn config(&self) -> ClusterConfig;

    /// Admission check at the applied height.
    fn validate(&self, operation: &Operation, proposer: &NodeId) -> Result<(), ValidationError>;

    /// Catch-up state updates.
    fn watch_sync(&self) -> watch::Receiver<SyncState>;

    /// Current catch-up state.
    fn sync_state(&self) -> SyncState {
        *self.watch_sync().borrow()
    }
}

/// Single-writer commit pipeline.
#[async_trait]
pub trait CommitSink: Send + Sync {
    /// Verify, buffer or append-and-apply a certified entry.
    ///
    /// Returns the local height afterwards.
    async fn deliver(&self, certified: CertifiedEntry) -> Result<u64, String>;
}

/// Outgoing connections to other members.
pub trait PeerDirectory: Send + Sync {
    /// Client for `node`, if the transport knows it.
    fn peer(&self, node: &NodeId) -> Option<Arc<dyn PeerRpc>>;
}

/// Nudges the catch-up manager.
pub trait LagSignal: Send + Sync {
    /// Some peer is at or beyond `observed_height`.
    fn lag_detected(&self, observed_height: u64);
}
