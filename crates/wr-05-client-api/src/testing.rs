//! Single-node stand-ins for the node runtime.

use crate::adapters::{AcceptAllBundleStore, TemplateLocator};
use crate::domain::ClientConfig;
use crate::ports::{BundleError, BundleStore, LocationToken, NodeStatus, ProposalSubmitter, SubmitError};
use crate::service::{ClientPorts, ClientService};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_crypto::KeyPair;
use shared_types::{
    ClusterConfig, ContentDigest, Deployment, Digest, Identity, LogEntry, NodeId, Operation,
    PeerInfo, SyncState, ValidationError,
};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use wr_02_state_store::{RegistryQueries, RegistryState};

/// Applies every submission immediately as the next log entry.
pub(crate) struct LocalNode {
    node_id: NodeId,
    state: RwLock<RegistryState>,
    heights: watch::Sender<u64>,
    sync: RwLock<SyncState>,
    submissions: AtomicUsize,
    stalled: AtomicBool,
    quorum_lost_after: AtomicU32,
}

impl LocalNode {
    pub fn new() -> Arc<Self> {
        let key = KeyPair::from_seed([1u8; 32]);
        let node_id: NodeId = key.public_key().into();
        let config = ClusterConfig::genesis(vec![PeerInfo {
            id: node_id,
            address: "local".into(),
        }]);
        let (heights, _) = watch::channel(0);
        Arc::new(Self {
            node_id,
            state: RwLock::new(RegistryState::genesis(config)),
            heights,
            sync: RwLock::new(SyncState::CaughtUp),
            submissions: AtomicUsize::new(0),
            stalled: AtomicBool::new(false),
            quorum_lost_after: AtomicU32::new(0),
        })
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Submissions never complete from now on.
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    /// Submissions fail as if `attempts` rounds found no quorum.
    pub fn lose_quorum(&self, attempts: u32) {
        self.quorum_lost_after.store(attempts, Ordering::SeqCst);
    }

    pub fn set_sync_state(&self, state: SyncState) {
        *self.sync.write() = state;
    }
}

#[async_trait]
impl ProposalSubmitter for LocalNode {
    async fn submit(&self, operation: Operation) -> Result<u64, SubmitError> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let attempts = self.quorum_lost_after.load(Ordering::SeqCst);
        if attempts > 0 {
            return Err(SubmitError::QuorumTimeout { attempts });
        }

        let mut state = self.state.write();
        state.validate(&operation)?;
        let index = state.height();
        let entry = LogEntry {
            index,
            round: 1,
            proposer: self.node_id,
            timestamp: 1_000 + index,
            operation,
        };
        state
            .apply(&entry)
            .map_err(|e| SubmitError::Unavailable(e.to_string()))?;
        self.heights.send_replace(state.height());
        Ok(index)
    }
}

impl RegistryQueries for LocalNode {
    fn lookup(&self, name: &str) -> Option<(Deployment, u64)> {
        self.state.read().lookup(name)
    }

    fn list_deployments(&self, owner: Option<&Identity>) -> Vec<Deployment> {
        self.state.read().list_deployments(owner)
    }

    fn next_version_for(&self, name: &str) -> u64 {
        self.state.read().next_version_for(name)
    }

    fn applied_height(&self) -> u64 {
        self.state.read().applied_height()
    }

    fn root(&self) -> Digest {
        self.state.read().root()
    }

    fn cluster_config(&self) -> ClusterConfig {
        self.state.read().cluster_config()
    }

    fn precheck(&self, operation: &Operation) -> Result<(), ValidationError> {
        self.state.read().precheck(operation)
    }
}

impl NodeStatus for LocalNode {
    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn sync_state(&self) -> SyncState {
        *self.sync.read()
    }

    fn applied_heights(&self) -> watch::Receiver<u64> {
        self.heights.subscribe()
    }
}

/// Bundle store that has nothing.
pub(crate) struct FailingBundles;

#[async_trait]
impl BundleStore for FailingBundles {
    async fn store_bundle(&self, digest: &ContentDigest) -> Result<LocationToken, BundleError> {
        Err(BundleError::Missing(*digest))
    }
}

pub(crate) fn service_with(
    node: Arc<LocalNode>,
    bundles: Arc<dyn BundleStore>,
) -> (ClientService, Arc<LocalNode>) {
    let config = ClientConfig::for_testing();
    let ports = ClientPorts {
        submitter: node.clone(),
        registry: node.clone(),
        status: node.clone(),
        locator: Arc::new(TemplateLocator::new(config.locator_template.clone())),
        bundles,
    };
    (ClientService::new(config, ports), node)
}

pub(crate) fn service() -> (ClientService, Arc<LocalNode>) {
    service_with(LocalNode::new(), Arc::new(AcceptAllBundleStore))
}
