//! # Subsystem Port Adapters
//!
//! Each subsystem only knows its own port traits. These adapters implement
//! them on top of the node's pipeline, catch-up manager and engine:
//!
//! | Adapter | Port | Subsystem |
//! |---------|------|-----------|
//! | [`NodeRegistryView`] | `RegistryView` | consensus |
//! | [`CatchUpLag`] | `LagSignal` | consensus |
//! | [`PeerSource`] | `SyncSource` | catch-up |
//! | [`EngineSubmitter`] | `ProposalSubmitter` | client API |
//! | [`NodeStatusView`] | `NodeStatus` | client API |

use crate::handlers::commit_pipeline::CommitPipeline;
use async_trait::async_trait;
use shared_types::{ClusterConfig, NodeId, Operation, PeerInfo, PeerRpc, SyncState, ValidationError};
use std::sync::Arc;
use tokio::sync::watch;
use wr_02_state_store::RegistryQueries;
use wr_03_consensus::{
    ConsensusApi, ConsensusEngine, ConsensusError, LagSignal, PeerDirectory, RegistryView,
};
use wr_04_catch_up::{CatchUpManager, SyncSource};
use wr_05_client_api::{NodeStatus, ProposalSubmitter, SubmitError};

/// Applied state plus sync state, as consensus sees them.
pub struct NodeRegistryView {
    pipeline: Arc<CommitPipeline>,
    catch_up: Arc<CatchUpManager>,
}

impl NodeRegistryView {
    pub fn new(pipeline: Arc<CommitPipeline>, catch_up: Arc<CatchUpManager>) -> Self {
        Self { pipeline, catch_up }
    }
}

impl RegistryView for NodeRegistryView {
    fn committed_height(&self) -> u64 {
        self.pipeline.height()
    }

    fn config(&self) -> ClusterConfig {
        self.pipeline.cluster_config()
    }

    fn validate(&self, operation: &Operation, proposer: &NodeId) -> Result<(), ValidationError> {
        self.pipeline
            .with_state(|state| state.validate_proposal(operation, proposer))
    }

    fn watch_sync(&self) -> watch::Receiver<SyncState> {
        self.catch_up.subscribe()
    }

    fn sync_state(&self) -> SyncState {
        if self.pipeline.is_halted() {
            SyncState::Halted
        } else {
            self.catch_up.state()
        }
    }
}

/// Forwards lag hints from consensus to catch-up.
pub struct CatchUpLag(pub Arc<CatchUpManager>);

impl LagSignal for CatchUpLag {
    fn lag_detected(&self, observed_height: u64) {
        self.0.lag_detected(observed_height);
    }
}

/// Members of the configuration in force, except this node.
pub struct PeerSource {
    node_id: NodeId,
    pipeline: Arc<CommitPipeline>,
    directory: Arc<dyn PeerDirectory>,
}

impl PeerSource {
    pub fn new(
        node_id: NodeId,
        pipeline: Arc<CommitPipeline>,
        directory: Arc<dyn PeerDirectory>,
    ) -> Self {
        Self {
            node_id,
            pipeline,
            directory,
        }
    }
}

impl SyncSource for PeerSource {
    fn peers(&self) -> Vec<(PeerInfo, Arc<dyn PeerRpc>)> {
        self.pipeline
            .cluster_config()
            .peers
            .into_iter()
            .filter(|peer| peer.id != self.node_id)
            .filter_map(|peer| {
                let rpc = self.directory.peer(&peer.id)?;
                Some((peer, rpc))
            })
            .collect()
    }
}

/// Submits through the engine and waits for the commit.
pub struct EngineSubmitter(pub Arc<ConsensusEngine>);

#[async_trait]
impl ProposalSubmitter for EngineSubmitter {
    async fn submit(&self, operation: Operation) -> Result<u64, SubmitError> {
        let handle = self.0.submit(operation).await.map_err(submit_error)?;
        let committed = handle.wait().await.map_err(submit_error)?;
        Ok(committed.index)
    }
}

fn submit_error(error: ConsensusError) -> SubmitError {
    match error {
        ConsensusError::Validation(reason) => SubmitError::Rejected(reason),
        ConsensusError::QuorumTimeout { attempts } => SubmitError::QuorumTimeout { attempts },
        other => SubmitError::Unavailable(other.to_string()),
    }
}

/// Node identity and progress for the client API.
pub struct NodeStatusView {
    node_id: NodeId,
    registry: Arc<NodeRegistryView>,
    pipeline: Arc<CommitPipeline>,
}

impl NodeStatusView {
    pub fn new(
        node_id: NodeId,
        registry: Arc<NodeRegistryView>,
        pipeline: Arc<CommitPipeline>,
    ) -> Self {
        Self {
            node_id,
            registry,
            pipeline,
        }
    }
}

impl NodeStatus for NodeStatusView {
    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn sync_state(&self) -> SyncState {
        self.registry.sync_state()
    }

    fn applied_heights(&self) -> watch::Receiver<u64> {
        self.pipeline.subscribe_heights()
    }
}
