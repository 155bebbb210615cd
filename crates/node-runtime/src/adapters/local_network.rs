//! # In-Process Network
//!
//! Broker that routes [`PeerRpc`] calls between nodes living in one process.
//! Tests cut links to simulate partitions:
//!
//! ```text
//! node A ── LocalLink(A→B) ──► LocalNetwork ──► node B (registered PeerRpc)
//!                                  │
//!                                  └─ isolated / severed? → Unreachable
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{
    CommitAck, CommitRequest, FetchEntriesRequest, FetchEntriesResponse, HealthResponse, NodeId,
    PeerRpc, PrepareRequest, Promise, ProposeRequest, TransportError, Vote,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use wr_03_consensus::PeerDirectory;

#[derive(Default)]
struct Topology {
    nodes: HashMap<NodeId, Arc<dyn PeerRpc>>,
    isolated: HashSet<NodeId>,
    severed: HashSet<(NodeId, NodeId)>,
}

/// Shared broker for in-process clusters.
#[derive(Default)]
pub struct LocalNetwork {
    topology: RwLock<Topology>,
}

impl LocalNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Route calls for `id` to `node`, replacing any earlier registration.
    pub fn register(&self, id: NodeId, node: Arc<dyn PeerRpc>) {
        self.topology.write().nodes.insert(id, node);
        debug!(node = %id, "Node joined local network");
    }

    pub fn unregister(&self, id: &NodeId) {
        self.topology.write().nodes.remove(id);
    }

    /// Cut every link to and from `id`.
    pub fn isolate(&self, id: NodeId) {
        self.topology.write().isolated.insert(id);
    }

    /// Undo [`Self::isolate`].
    pub fn heal(&self, id: &NodeId) {
        self.topology.write().isolated.remove(id);
    }

    /// Cut the link between `a` and `b` in both directions.
    pub fn partition(&self, a: NodeId, b: NodeId) {
        let mut topology = self.topology.write();
        topology.severed.insert((a, b));
        topology.severed.insert((b, a));
    }

    /// Restore every link.
    pub fn heal_all(&self) {
        let mut topology = self.topology.write();
        topology.isolated.clear();
        topology.severed.clear();
    }

    /// Whether a call from `from` reaches `to`.
    pub fn can_reach(&self, from: &NodeId, to: &NodeId) -> bool {
        let topology = self.topology.read();
        topology.nodes.contains_key(to)
            && !topology.isolated.contains(from)
            && !topology.isolated.contains(to)
            && !topology.severed.contains(&(*from, *to))
    }

    fn route(&self, from: &NodeId, to: &NodeId) -> Result<Arc<dyn PeerRpc>, TransportError> {
        if !self.can_reach(from, to) {
            return Err(TransportError::Unreachable(*to));
        }
        self.topology
            .read()
            .nodes
            .get(to)
            .cloned()
            .ok_or(TransportError::Unreachable(*to))
    }

    /// Outgoing directory for node `from`.
    pub fn directory_for(self: &Arc<Self>, from: NodeId) -> LocalDirectory {
        LocalDirectory {
            from,
            network: Arc::clone(self),
        }
    }
}

/// [`PeerDirectory`] handing out links from one node.
pub struct LocalDirectory {
    from: NodeId,
    network: Arc<LocalNetwork>,
}

impl PeerDirectory for LocalDirectory {
    fn peer(&self, node: &NodeId) -> Option<Arc<dyn PeerRpc>> {
        Some(Arc::new(LocalLink {
            from: self.from,
            to: *node,
            network: Arc::clone(&self.network),
        }))
    }
}

/// One directed link; reachability is checked on every call.
struct LocalLink {
    from: NodeId,
    to: NodeId,
    network: Arc<LocalNetwork>,
}

impl LocalLink {
    fn target(&self) -> Result<Arc<dyn PeerRpc>, TransportError> {
        self.network.route(&self.from, &self.to)
    }
}

#[async_trait]
impl PeerRpc for LocalLink {
    async fn prepare(&self, request: PrepareRequest) -> Result<Promise, TransportError> {
        self.target()?.prepare(request).await
    }

    async fn propose(&self, request: ProposeRequest) -> Result<Vote, TransportError> {
        self.target()?.propose(request).await
    }

    async fn commit(&self, request: CommitRequest) -> Result<CommitAck, TransportError> {
        self.target()?.commit(request).await
    }

    async fn fetch_entries(
        &self,
        request: FetchEntriesRequest,
    ) -> Result<FetchEntriesResponse, TransportError> {
        self.target()?.fetch_entries(request).await
    }

    async fn health(&self) -> Result<HealthResponse, TransportError> {
        self.target()?.health().await
    }
}
