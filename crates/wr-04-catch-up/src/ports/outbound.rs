//! # Outbound Ports

use async_trait::async_trait;
use shared_types::{CertifiedEntry, ClusterConfig, Digest, PeerInfo, PeerRpc};
use std::sync::Arc;

/// Where entries come from.
pub trait SyncSource: Send + Sync {
    /// Other members with a client for each.
    fn peers(&self) -> Vec<(PeerInfo, Arc<dyn PeerRpc>)>;
}

/// A batch the writer stopped part-way through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRejected {
    /// Local height after the entries that did apply.
    pub height: u64,
    /// What failed.
    pub reason: String,
}

/// The node's single writer.
#[async_trait]
pub trait EntrySink: Send + Sync {
    /// Local committed height.
    fn local_height(&self) -> u64;

    /// Digest of the local genesis configuration.
    fn genesis_hash(&self) -> Digest;

    /// Configuration in force at the local height.
    fn config(&self) -> ClusterConfig;

    /// Verify each certificate against the configuration in force at its
    /// height, then append and apply in ascending order. Stops at the first
    /// failure.
    async fn apply_batch(&self, entries: Vec<CertifiedEntry>) -> Result<u64, BatchRejected>;
}
