use super::*;
use crate::ports::{CommitSink, LagSignal, PeerDirectory, RegistryView};
use shared_types::{
    CertifiedEntry, ClusterConfig, ContentDigest, DeployIntent, FetchEntriesRequest,
    FetchEntriesResponse, HealthResponse, PeerInfo, PeerRpc, TransportError, ValidationError,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use wr_02_state_store::RegistryState;

// Mock node: registry state plus an unbounded reorder buffer
struct TestNode {
    state: Mutex<RegistryState>,
    pending: Mutex<BTreeMap<u64, CertifiedEntry>>,
    log: Mutex<Vec<CertifiedEntry>>,
    sync: watch::Sender<SyncState>,
    lag_seen: AtomicU64,
}

impl TestNode {
    fn new(config: ClusterConfig) -> Self {
        let (sync, _) = watch::channel(SyncState::CaughtUp);
        Self {
            state: Mutex::new(RegistryState::genesis(config)),
            pending: Mutex::new(BTreeMap::new()),
            log: Mutex::new(Vec::new()),
            sync,
            lag_seen: AtomicU64::new(0),
        }
    }

    fn height(&self) -> u64 {
        self.state.lock().height()
    }
}

impl RegistryView for TestNode {
    fn committed_height(&self) -> u64 {
        self.height()
    }

    fn config(&self) -> ClusterConfig {
        self.state.lock().config().clone()
    }

    fn validate(&self, operation: &Operation, proposer: &NodeId) -> Result<(), ValidationError> {
        self.state.lock().validate_proposal(operation, proposer)
    }

    fn watch_sync(&self) -> watch::Receiver<SyncState> {
        self.sync.subscribe()
    }
}

#[async_trait]
impl CommitSink for TestNode {
    async fn deliver(&self, certified: CertifiedEntry) -> Result<u64, String> {
        let mut state = self.state.lock();
        let mut pending = self.pending.lock();
        if certified.index() >= state.height() {
            pending.entry(certified.index()).or_insert(certified);
        }
        while let Some(next) = pending.remove(&state.height()) {
            next.certificate
                .verify(&next.entry, state.config())
                .map_err(|e| e.to_string())?;
            state.apply(&next.entry).map_err(|e| e.to_string())?;
            self.log.lock().push(next);
        }
        Ok(state.height())
    }
}

impl LagSignal for TestNode {
    fn lag_detected(&self, observed_height: u64) {
        self.lag_seen.fetch_max(observed_height, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Directory {
    peers: Mutex<HashMap<NodeId, Arc<dyn PeerRpc>>>,
    down: Mutex<HashSet<NodeId>>,
}

impl PeerDirectory for Directory {
    fn peer(&self, node: &NodeId) -> Option<Arc<dyn PeerRpc>> {
        if self.down.lock().contains(node) {
            return None;
        }
        self.peers.lock().get(node).cloned()
    }
}

struct EngineRpc(Arc<ConsensusEngine>);

#[async_trait]
impl PeerRpc for EngineRpc {
    async fn prepare(&self, request: PrepareRequest) -> Result<Promise, TransportError> {
        Ok(self.0.handle_prepare(request).await)
    }

    async fn propose(&self, request: ProposeRequest) -> Result<Vote, TransportError> {
        Ok(self.0.handle_propose(request).await)
    }

    async fn commit(&self, request: CommitRequest) -> Result<CommitAck, TransportError> {
        Ok(self.0.handle_commit(request).await)
    }

    async fn fetch_entries(
        &self,
        _request: FetchEntriesRequest,
    ) -> Result<FetchEntriesResponse, TransportError> {
        Err(TransportError::Remote("not served".into()))
    }

    async fn health(&self) -> Result<HealthResponse, TransportError> {
        Err(TransportError::Remote("not served".into()))
    }
}

struct Cluster {
    nodes: Vec<Arc<TestNode>>,
    engines: Vec<Arc<ConsensusEngine>>,
    directory: Arc<Directory>,
    _shutdown: watch::Sender<bool>,
}

impl Cluster {
    async fn wait_for_height(&self, height: u64) {
        let reached = tokio::time::timeout(Duration::from_secs(5), async {
            while self.nodes.iter().any(|n| n.height() < height) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(reached.is_ok(), "cluster did not reach height {height}");
    }
}

fn cluster_with(n: u8, config: ConsensusConfig) -> Cluster {
    let keys: Vec<KeyPair> = (1..=n).map(|s| KeyPair::from_seed([s; 32])).collect();
    let genesis = ClusterConfig::genesis(
        keys.iter()
            .enumerate()
            .map(|(i, k)| PeerInfo {
                id: k.public_key().into(),
                address: format!("node-{i}"),
            })
            .collect(),
    );
    let directory = Arc::new(Directory::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut nodes = Vec::new();
    let mut engines = Vec::new();
    for key in keys {
        let node = Arc::new(TestNode::new(genesis.clone()));
        let ports = ConsensusPorts {
            registry: node.clone(),
            sink: node.clone(),
            peers: directory.clone(),
            lag: node.clone(),
            events: Arc::new(InMemoryEventBus::new()),
        };
        let engine = Arc::new(ConsensusEngine::new(key, config.clone(), ports));
        engine.spawn_driver(shutdown_rx.clone());
        directory
            .peers
            .lock()
            .insert(engine.node_id(), Arc::new(EngineRpc(engine.clone())));
        nodes.push(node);
        engines.push(engine);
    }

    Cluster {
        nodes,
        engines,
        directory,
        _shutdown: shutdown_tx,
    }
}

fn cluster(n: u8) -> Cluster {
    cluster_with(n, ConsensusConfig::for_testing())
}

fn deployer() -> KeyPair {
    KeyPair::from_seed([200u8; 32])
}

fn deploy(name: &str, version: u64) -> Operation {
    Operation::Deploy(DeployIntent::signed(
        name,
        ContentDigest([7u8; 32]),
        version,
        None,
        &deployer(),
    ))
}

#[tokio::test]
async fn test_single_member_commits_operation() {
    let cluster = cluster(1);
    let handle = cluster.engines[0].submit(deploy("blog", 1)).await.unwrap();
    let committed = handle.wait().await.unwrap();

    assert_eq!(committed.index, 0);
    let state = cluster.nodes[0].state.lock();
    assert_eq!(state.height(), 1);
    assert_eq!(state.get("blog").unwrap().0.version, 1);
}

#[tokio::test]
async fn test_three_members_converge() {
    let cluster = cluster(3);

    let a = cluster.engines[0].submit(deploy("a", 1)).await.unwrap();
    assert_eq!(a.wait().await.unwrap().index, 0);
    let b = cluster.engines[1].submit(deploy("b", 1)).await.unwrap();
    assert_eq!(b.wait().await.unwrap().index, 1);

    cluster.wait_for_height(2).await;
    let reference = cluster.nodes[0].state.lock().encode();
    for node in &cluster.nodes {
        assert_eq!(node.state.lock().encode(), reference);
    }
}

#[tokio::test]
async fn test_validation_error_returned_immediately() {
    let cluster = cluster(3);
    let handle = cluster.engines[0].submit(deploy("blog", 0)).await.unwrap();

    assert!(matches!(
        handle.wait().await,
        Err(ConsensusError::Validation(ValidationError::StaleVersion { .. }))
    ));
    assert_eq!(cluster.nodes[0].height(), 0);
}

#[tokio::test]
async fn test_quorum_timeout_without_peers() {
    let config = ConsensusConfig {
        max_attempts: 3,
        ..ConsensusConfig::for_testing()
    };
    let cluster = cluster_with(3, config);
    for engine in &cluster.engines[1..] {
        cluster.directory.down.lock().insert(engine.node_id());
    }

    let handle = cluster.engines[0].submit(deploy("blog", 1)).await.unwrap();
    assert_eq!(
        handle.wait().await,
        Err(ConsensusError::QuorumTimeout { attempts: 3 })
    );
    assert_eq!(cluster.nodes[0].height(), 0);
}

#[tokio::test]
async fn test_proposer_stalls_while_not_caught_up() {
    let config = ConsensusConfig {
        max_attempts: 2,
        round_timeout_ms: 50,
        ..ConsensusConfig::for_testing()
    };
    let cluster = cluster_with(3, config);
    cluster.nodes[0].sync.send_replace(SyncState::Behind);

    let handle = cluster.engines[0].submit(deploy("blog", 1)).await.unwrap();
    assert_eq!(handle.wait().await, Err(ConsensusError::PartitionStall));
}

#[tokio::test]
async fn test_stalled_proposer_resumes_after_catch_up() {
    let cluster = cluster(3);
    let node = cluster.nodes[0].clone();
    node.sync.send_replace(SyncState::Syncing { target: 0 });

    let handle = cluster.engines[0].submit(deploy("blog", 1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    node.sync.send_replace(SyncState::CaughtUp);

    assert_eq!(handle.wait().await.unwrap().index, 0);
}

#[tokio::test]
async fn test_voter_gates_on_index_and_ballot() {
    let cluster = cluster(3);
    let engine = &cluster.engines[0];
    let proposer = cluster.engines[1].node_id();

    let ahead = engine.on_prepare(PrepareRequest {
        index: 3,
        ballot: Ballot::new(1, proposer),
    });
    assert_eq!(
        ahead.reason,
        Some(RejectReason::VoterBehind {
            committed_height: 0
        })
    );
    assert_eq!(cluster.nodes[0].lag_seen.load(Ordering::SeqCst), 3);

    let high = Ballot::new(5, proposer);
    assert!(engine.on_prepare(PrepareRequest { index: 0, ballot: high }).granted);

    let low = engine.on_prepare(PrepareRequest {
        index: 0,
        ballot: Ballot::new(3, proposer),
    });
    assert_eq!(low.reason, Some(RejectReason::StaleBallot { promised: high }));

    let entry = shared_types::LogEntry {
        index: 0,
        round: 5,
        proposer,
        timestamp: 1,
        operation: deploy("blog", 1),
    };
    let vote = engine.on_propose(ProposeRequest::from_entry(&entry));
    assert!(vote.accept);
    let signature = shared_types::VoteSignature {
        voter: vote.voter,
        signature: vote.signature.unwrap(),
    };
    assert!(signature.verify(0, &high, &entry.digest()).is_ok());
}

#[tokio::test]
async fn test_voter_refuses_when_not_caught_up_or_halted() {
    let cluster = cluster(3);
    let engine = &cluster.engines[0];
    let request = PrepareRequest {
        index: 0,
        ballot: Ballot::new(1, cluster.engines[1].node_id()),
    };

    cluster.nodes[0].sync.send_replace(SyncState::Behind);
    assert_eq!(
        engine.on_prepare(request.clone()).reason,
        Some(RejectReason::NotCaughtUp)
    );

    cluster.nodes[0].sync.send_replace(SyncState::Halted);
    assert_eq!(engine.on_prepare(request).reason, Some(RejectReason::Halted));
    assert_eq!(
        engine.submit(deploy("blog", 1)).await.err(),
        Some(ConsensusError::Halted)
    );
}

#[tokio::test]
async fn test_outsider_ballot_refused() {
    let cluster = cluster(3);
    let outsider: NodeId = KeyPair::from_seed([99u8; 32]).public_key().into();
    let promise = cluster.engines[0].on_prepare(PrepareRequest {
        index: 0,
        ballot: Ballot::new(1, outsider),
    });
    assert_eq!(promise.reason, Some(RejectReason::NotAMember));
}

#[tokio::test]
async fn test_accepted_entry_is_finished_before_own_operation() {
    let cluster = cluster(3);
    let earlier_proposer = cluster.engines[2].node_id();
    let earlier = shared_types::LogEntry {
        index: 0,
        round: 1,
        proposer: earlier_proposer,
        timestamp: 42,
        operation: deploy("alpha", 1),
    };
    // Two voters accepted "alpha" before its proposer went quiet.
    for engine in &cluster.engines[1..] {
        assert!(engine.on_propose(ProposeRequest::from_entry(&earlier)).accept);
    }

    let handle = cluster.engines[0].submit(deploy("beta", 1)).await.unwrap();
    assert_eq!(handle.wait().await.unwrap().index, 1);

    let finished = cluster.nodes[0].log.lock()[0].entry.clone();
    assert_eq!(finished.operation, earlier.operation);
    assert_eq!(finished.timestamp, earlier.timestamp);
    assert_eq!(finished.proposer, cluster.engines[0].node_id());
    assert!(finished.ballot() > earlier.ballot());

    let state = cluster.nodes[0].state.lock();
    let (alpha, _) = state.get("alpha").unwrap();
    assert_eq!(alpha.committed_at, 0);
    assert_eq!(alpha.timestamp, 42);
    assert_eq!(state.get("beta").unwrap().0.committed_at, 1);
}

#[tokio::test]
async fn test_restamped_entry_applies_identically() {
    let cluster = cluster(3);
    let original = shared_types::LogEntry {
        index: 0,
        round: 1,
        proposer: cluster.engines[2].node_id(),
        timestamp: 42,
        operation: deploy("alpha", 1),
    };
    let restamped = shared_types::LogEntry {
        round: 4,
        proposer: cluster.engines[0].node_id(),
        ..original.clone()
    };
    assert_ne!(original.digest(), restamped.digest());

    let config = cluster.nodes[0].config();
    let mut first = RegistryState::genesis(config.clone());
    let mut second = RegistryState::genesis(config);
    first.apply(&original).unwrap();
    second.apply(&restamped).unwrap();
    assert_eq!(first.encode(), second.encode());
    assert_eq!(first.state_root(), second.state_root());
}

#[tokio::test]
async fn test_commit_announcement_catches_up_missed_peer() {
    let cluster = cluster(3);
    let missed = cluster.engines[2].node_id();
    cluster.directory.down.lock().insert(missed);

    for (i, name) in ["one", "two"].into_iter().enumerate() {
        let handle = cluster.engines[0].submit(deploy(name, 1)).await.unwrap();
        assert_eq!(handle.wait().await.unwrap().index, i as u64);
    }
    assert_eq!(cluster.nodes[2].height(), 0);

    let log = cluster.nodes[0].log.lock().clone();
    // Out of order: the second entry waits for the first.
    let ack = cluster.engines[2]
        .handle_commit(CommitRequest {
            certified: log[1].clone(),
        })
        .await;
    assert!(ack.accepted);
    assert_eq!(ack.committed_height, 0);
    assert_eq!(cluster.nodes[2].lag_seen.load(Ordering::SeqCst), 1);

    let ack = cluster.engines[2]
        .handle_commit(CommitRequest {
            certified: log[0].clone(),
        })
        .await;
    assert_eq!(ack.committed_height, 2);
    assert_eq!(
        cluster.nodes[2].state.lock().encode(),
        cluster.nodes[0].state.lock().encode()
    );
}

#[tokio::test]
async fn test_commit_with_mismatched_certificate_refused() {
    let cluster = cluster(1);
    let handle = cluster.engines[0].submit(deploy("blog", 1)).await.unwrap();
    handle.wait().await.unwrap();

    let mut forged = cluster.nodes[0].log.lock()[0].clone();
    forged.entry.index = 1;
    let ack = cluster.engines[0]
        .handle_commit(CommitRequest { certified: forged })
        .await;
    assert!(!ack.accepted);
    assert_eq!(cluster.nodes[0].height(), 1);
}

#[tokio::test]
async fn test_dropped_handle_does_not_cancel_proposal() {
    let cluster = cluster(3);
    let handle = cluster.engines[0].submit(deploy("blog", 1)).await.unwrap();
    drop(handle);

    cluster.wait_for_height(1).await;
    assert!(cluster.nodes[2].state.lock().get("blog").is_some());
}
