//! # Registry Node
//!
//! Wires one node together and owns its background tasks.
//!
//! ```text
//!                 ┌────────────── RegistryNode (inbound PeerRpc) ─────────────┐
//! peer RPC ──────►│ ConsensusEngine ──deliver──► CommitPipeline ◄──apply_batch─┤ CatchUpManager
//!                 │       ▲                          │   ▲                      │      │
//! client RPC ────►│ ClientService ──submit───────────┘   └──── queries          │      │
//!                 └───────┴──────── PeerDirectory (LocalNetwork | HTTP) ◄───────┴──────┘
//! ```
//!
//! Construction order matters: the pipeline is opened first (log reload,
//! snapshot restore, suffix replay), every other component borrows it.

use crate::adapters::http_transport::HttpDirectory;
use crate::adapters::local_network::LocalNetwork;
use crate::adapters::node_ports::{
    CatchUpLag, EngineSubmitter, NodeRegistryView, NodeStatusView, PeerSource,
};
use crate::config::NodeConfig;
use crate::handlers::commit_pipeline::{CommitPipeline, PipelineSettings};
use crate::handlers::sync_driver::{
    run_catch_up, run_event_monitor, run_halt_watcher, run_heartbeat,
};
use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_bus::{EventFilter, EventSubscriber, InMemoryEventBus};
use shared_types::{
    CommitAck, CommitRequest, FetchEntriesRequest, FetchEntriesResponse, HealthResponse, NodeId,
    PeerRpc, PrepareRequest, Promise, ProposeRequest, TransportError, Vote,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wr_01_replication_log::{
    BufferConfig, FileLogStore, FileSnapshotStore, LogStore, MemoryLogStore, MemorySnapshotStore,
    SnapshotStore,
};
use wr_02_state_store::RegistryQueries;
use wr_03_consensus::{ConsensusApi, ConsensusEngine, ConsensusPorts, PeerDirectory, RegistryView};
use wr_04_catch_up::CatchUpManager;
use wr_05_client_api::{AcceptAllBundleStore, ClientPorts, ClientService, TemplateLocator};

/// How the node reaches its peers.
#[derive(Clone)]
pub enum Transport {
    /// In-process broker; the node registers itself on open.
    Local(Arc<LocalNetwork>),
    /// JSON over HTTP to the addresses in the cluster configuration.
    Http { request_timeout: Duration },
}

/// One registry node.
pub struct RegistryNode {
    node_id: NodeId,
    config: NodeConfig,
    events: Arc<InMemoryEventBus>,
    pipeline: Arc<CommitPipeline>,
    catch_up: Arc<CatchUpManager>,
    view: Arc<NodeRegistryView>,
    engine: Arc<ConsensusEngine>,
    client: Arc<ClientService>,
    network: Option<Arc<LocalNetwork>>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl RegistryNode {
    /// Build every component; nothing runs until [`Self::start`].
    pub fn open(config: NodeConfig, transport: Transport) -> anyhow::Result<Arc<Self>> {
        config.validate().context("invalid node configuration")?;
        let key = config.key_pair()?;
        let node_id: NodeId = key.public_key().into();
        let events = Arc::new(InMemoryEventBus::new());

        let (log_store, snapshot_store) = open_stores(&config)?;
        let pipeline = Arc::new(
            CommitPipeline::open(
                config.genesis.cluster_config(),
                log_store,
                snapshot_store,
                PipelineSettings {
                    snapshot_interval: config.storage.snapshot_interval,
                    snapshots_kept: config.storage.snapshots_kept,
                    buffer: BufferConfig::default(),
                },
                events.clone(),
            )
            .context("cannot open commit pipeline")?,
        );

        let network = match &transport {
            Transport::Local(network) => Some(network.clone()),
            Transport::Http { .. } => None,
        };
        let directory: Arc<dyn PeerDirectory> = match &transport {
            Transport::Local(network) => Arc::new(network.directory_for(node_id)),
            Transport::Http { request_timeout } => Arc::new(
                HttpDirectory::new(pipeline.clone(), *request_timeout)
                    .context("cannot build HTTP client")?,
            ),
        };

        let catch_up = Arc::new(CatchUpManager::new(
            config.catch_up.clone(),
            Arc::new(PeerSource::new(node_id, pipeline.clone(), directory.clone())),
            pipeline.clone(),
            events.clone(),
        ));
        let view = Arc::new(NodeRegistryView::new(pipeline.clone(), catch_up.clone()));

        let engine = Arc::new(ConsensusEngine::new(
            key,
            config.consensus.clone(),
            ConsensusPorts {
                registry: view.clone(),
                sink: pipeline.clone(),
                peers: directory,
                lag: Arc::new(CatchUpLag(catch_up.clone())),
                events: events.clone(),
            },
        ));

        let client = Arc::new(ClientService::new(
            config.client.clone(),
            ClientPorts {
                submitter: Arc::new(EngineSubmitter(engine.clone())),
                registry: pipeline.clone(),
                status: Arc::new(NodeStatusView::new(node_id, view.clone(), pipeline.clone())),
                locator: Arc::new(TemplateLocator::new(config.client.locator_template.clone())),
                bundles: Arc::new(AcceptAllBundleStore),
            },
        ));

        let (shutdown, _) = watch::channel(false);
        let node = Arc::new(Self {
            node_id,
            config,
            events,
            pipeline,
            catch_up,
            view,
            engine,
            client,
            network,
            shutdown,
            tasks: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        });

        if let Some(network) = &node.network {
            network.register(node_id, node.clone());
        }
        info!(
            node = %node_id,
            height = node.pipeline.height(),
            members = node.pipeline.cluster_config().member_count(),
            "Registry node opened"
        );
        Ok(node)
    }

    /// Spawn the event monitor, proposal driver, catch-up loop, halt watcher
    /// and heartbeat.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            warn!(node = %self.node_id, "Node already started");
            return;
        }
        let monitor = self.events.subscribe(EventFilter::all());
        let shutdown = self.shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            let handled = run_event_monitor(monitor, shutdown).await;
            debug!(handled, "Event monitor stopped");
        }));
        if let Some(driver) = self.engine.spawn_driver(self.shutdown.subscribe()) {
            tasks.push(driver);
        }
        tasks.push(tokio::spawn(run_catch_up(
            self.catch_up.clone(),
            self.shutdown.subscribe(),
        )));
        tasks.push(tokio::spawn(run_halt_watcher(
            self.pipeline.clone(),
            self.catch_up.clone(),
            self.shutdown.subscribe(),
        )));
        tasks.push(tokio::spawn(run_heartbeat(
            self.pipeline.clone(),
            self.catch_up.clone(),
            self.config.liveness.heartbeat(),
            self.shutdown.subscribe(),
        )));
        info!(node = %self.node_id, "Registry node started");
    }

    /// Stop answering peers, stop every task and leave the network.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _ = self.shutdown.send(true);
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(node = %self.node_id, error = %e, "Task ended abnormally");
            }
        }
        if let Some(network) = &self.network {
            network.unregister(&self.node_id);
        }
        info!(node = %self.node_id, height = self.pipeline.height(), "Registry node stopped");
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Client operations served by this node.
    pub fn client(&self) -> Arc<ClientService> {
        self.client.clone()
    }

    pub fn pipeline(&self) -> &Arc<CommitPipeline> {
        &self.pipeline
    }

    pub fn catch_up(&self) -> &Arc<CatchUpManager> {
        &self.catch_up
    }

    pub fn events(&self) -> &Arc<InMemoryEventBus> {
        &self.events
    }

    /// Sync state as peers see it.
    pub fn sync_state(&self) -> shared_types::SyncState {
        self.view.sync_state()
    }

    fn ensure_serving(&self) -> Result<(), TransportError> {
        if self.stopped.load(Ordering::SeqCst) {
            Err(TransportError::Unreachable(self.node_id))
        } else {
            Ok(())
        }
    }
}

fn open_stores(
    config: &NodeConfig,
) -> anyhow::Result<(Box<dyn LogStore>, Box<dyn SnapshotStore>)> {
    let Some(dir) = &config.node.data_dir else {
        return Ok((
            Box::new(MemoryLogStore::new()),
            Box::new(MemorySnapshotStore::new()),
        ));
    };
    let log = FileLogStore::open(dir.join("log.bin"))
        .with_context(|| format!("cannot open log in {}", dir.display()))?
        .with_sync_writes(config.storage.sync_writes);
    let snapshots = FileSnapshotStore::open(dir.join("snapshots"))
        .with_context(|| format!("cannot open snapshots in {}", dir.display()))?;
    Ok((Box::new(log), Box::new(snapshots)))
}

#[async_trait]
impl PeerRpc for RegistryNode {
    async fn prepare(&self, request: PrepareRequest) -> Result<Promise, TransportError> {
        self.ensure_serving()?;
        Ok(self.engine.handle_prepare(request).await)
    }

    async fn propose(&self, request: ProposeRequest) -> Result<Vote, TransportError> {
        self.ensure_serving()?;
        Ok(self.engine.handle_propose(request).await)
    }

    async fn commit(&self, request: CommitRequest) -> Result<CommitAck, TransportError> {
        self.ensure_serving()?;
        Ok(self.engine.handle_commit(request).await)
    }

    async fn fetch_entries(
        &self,
        request: FetchEntriesRequest,
    ) -> Result<FetchEntriesResponse, TransportError> {
        self.ensure_serving()?;
        let limit = self.config.network.max_fetch_entries;
        let to = request
            .to_index
            .min(request.from_index.saturating_add(limit));
        let entries = self.pipeline.entries(request.from_index..to).await;
        Ok(FetchEntriesResponse {
            entries,
            committed_height: self.pipeline.height(),
        })
    }

    async fn health(&self) -> Result<HealthResponse, TransportError> {
        self.ensure_serving()?;
        Ok(HealthResponse {
            node_id: self.node_id,
            committed_height: self.pipeline.height(),
            state: self.view.sync_state(),
            config_version: self.pipeline.cluster_config().version,
            genesis_hash: self.pipeline.genesis_hash(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenesisPeer;
    use shared_crypto::KeyPair;
    use shared_types::{ContentDigest, SyncState};

    fn single_member(seed: u8) -> NodeConfig {
        let id = KeyPair::from_seed([seed; 32]).public_key().into();
        NodeConfig::for_testing(
            [seed; 32],
            vec![GenesisPeer {
                id,
                address: "local".into(),
            }],
        )
    }

    #[tokio::test]
    async fn test_single_member_node_commits_deploy() {
        let network = LocalNetwork::new();
        let node = RegistryNode::open(single_member(1), Transport::Local(network)).unwrap();
        node.start();

        let mut states = node.catch_up().subscribe();
        tokio::time::timeout(Duration::from_secs(2), states.wait_for(SyncState::is_caught_up))
            .await
            .unwrap()
            .unwrap();

        let deployer = KeyPair::from_seed([9u8; 32]);
        let receipt = node
            .client()
            .deploy("blog", ContentDigest([3u8; 32]), None, &deployer)
            .await
            .unwrap();
        assert_eq!(receipt.version, 1);
        assert_eq!(node.pipeline().height(), 1);

        let health = node.health().await.unwrap();
        assert_eq!(health.committed_height, 1);
        assert_eq!(health.genesis_hash, node.pipeline().genesis_hash());

        node.stop().await;
        assert!(matches!(
            node.health().await,
            Err(TransportError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_is_capped() {
        let mut config = single_member(1);
        config.network.max_fetch_entries = 2;
        let node = RegistryNode::open(config, Transport::Local(LocalNetwork::new())).unwrap();
        node.start();
        let mut states = node.catch_up().subscribe();
        tokio::time::timeout(Duration::from_secs(2), states.wait_for(SyncState::is_caught_up))
            .await
            .unwrap()
            .unwrap();

        let deployer = KeyPair::from_seed([9u8; 32]);
        for name in ["a", "b", "c"] {
            node.client()
                .deploy(name, ContentDigest([1u8; 32]), None, &deployer)
                .await
                .unwrap();
        }

        let reply = node
            .fetch_entries(FetchEntriesRequest {
                from_index: 0,
                to_index: 10,
            })
            .await
            .unwrap();
        assert_eq!(reply.entries.len(), 2);
        assert_eq!(reply.committed_height, 3);
        node.stop().await;
    }
}
