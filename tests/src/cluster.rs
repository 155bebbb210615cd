//! # Test Cluster
//!
//! Boots `n` genesis members on one [`LocalNetwork`]. Node `i` signs with
//! seed `[i + 1; 32]`; nodes can be left unstarted (late joiners), stopped
//! and reopened from their data directory.

use node_runtime::{GenesisPeer, LocalNetwork, NodeConfig, RegistryNode, Transport};
use shared_crypto::KeyPair;
use shared_types::NodeId;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::{sleep, Instant};

/// Default deadline for cluster-wide waits.
pub const SETTLE: Duration = Duration::from_secs(10);

/// In-process cluster.
pub struct TestCluster {
    network: Arc<LocalNetwork>,
    genesis: Vec<GenesisPeer>,
    configure: Box<dyn Fn(&mut NodeConfig) + Send + Sync>,
    data: Option<TempDir>,
    nodes: Vec<Option<Arc<RegistryNode>>>,
}

impl TestCluster {
    /// Cluster of `size` members; nothing is started.
    pub fn new(size: usize) -> Self {
        Self::with_config(size, |_| {})
    }

    /// Cluster whose node configs pass through `configure`.
    pub fn with_config(
        size: usize,
        configure: impl Fn(&mut NodeConfig) + Send + Sync + 'static,
    ) -> Self {
        registry_telemetry::init_test_tracing();
        let genesis = (0..size)
            .map(|i| GenesisPeer {
                id: node_id(i),
                address: format!("local://node-{i}"),
            })
            .collect();
        Self {
            network: LocalNetwork::new(),
            genesis,
            configure: Box::new(configure),
            data: None,
            nodes: (0..size).map(|_| None).collect(),
        }
    }

    /// Keep logs and snapshots on disk, one directory per node.
    pub fn persistent(mut self) -> Self {
        self.data = Some(tempfile::tempdir().expect("temp dir"));
        self
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn network(&self) -> &Arc<LocalNetwork> {
        &self.network
    }

    /// Configuration node `i` is opened with.
    pub fn config_for(&self, i: usize) -> NodeConfig {
        let mut config = NodeConfig::for_testing(seed(i), self.genesis.clone());
        config.consensus.max_attempts = 20;
        if let Some(dir) = &self.data {
            config.node.data_dir = Some(dir.path().join(format!("node-{i}")));
        }
        (self.configure)(&mut config);
        config
    }

    /// Open and start node `i`.
    pub fn launch(&mut self, i: usize) -> Arc<RegistryNode> {
        let node = RegistryNode::open(self.config_for(i), Transport::Local(self.network.clone()))
            .expect("node opens");
        node.start();
        self.nodes[i] = Some(node.clone());
        node
    }

    /// Launch every node.
    pub async fn start_all(&mut self) {
        for i in 0..self.size() {
            self.launch(i);
        }
        self.wait_all_caught_up().await;
    }

    /// Launch nodes `0..count` and wait until they are caught up.
    pub async fn start_first(&mut self, count: usize) {
        for i in 0..count {
            self.launch(i);
        }
        for i in 0..count {
            self.wait_caught_up(i).await;
        }
    }

    /// Stop node `i` and forget it.
    pub async fn stop(&mut self, i: usize) {
        if let Some(node) = self.nodes[i].take() {
            node.stop().await;
        }
    }

    pub async fn stop_all(&mut self) {
        for i in 0..self.size() {
            self.stop(i).await;
        }
    }

    pub fn node(&self, i: usize) -> &Arc<RegistryNode> {
        self.nodes[i].as_ref().expect("node is running")
    }

    /// Running nodes.
    pub fn running(&self) -> Vec<&Arc<RegistryNode>> {
        self.nodes.iter().flatten().collect()
    }

    pub async fn wait_caught_up(&self, i: usize) {
        let node = self.node(i);
        let mut states = node.catch_up().subscribe();
        tokio::time::timeout(SETTLE, states.wait_for(|s| s.is_caught_up()))
            .await
            .unwrap_or_else(|_| panic!("node {i} not caught up"))
            .expect("catch-up alive");
    }

    pub async fn wait_all_caught_up(&self) {
        for i in 0..self.size() {
            if self.nodes[i].is_some() {
                self.wait_caught_up(i).await;
            }
        }
    }

    /// Wait until node `i` has applied `height` entries.
    pub async fn wait_height(&self, i: usize, height: u64) {
        let mut heights = self.node(i).pipeline().subscribe_heights();
        tokio::time::timeout(SETTLE, heights.wait_for(|h| *h >= height))
            .await
            .unwrap_or_else(|_| panic!("node {i} did not reach height {height}"))
            .expect("pipeline alive");
    }

    /// Wait until every running node has the same height and state bytes.
    pub async fn wait_converged(&self) -> u64 {
        let deadline = Instant::now() + SETTLE;
        loop {
            let nodes = self.running();
            let height = nodes[0].pipeline().height();
            let state = nodes[0].pipeline().encoded_state();
            let converged = nodes.iter().all(|n| {
                n.pipeline().height() == height && n.pipeline().encoded_state() == state
            });
            if converged {
                return height;
            }
            assert!(Instant::now() < deadline, "cluster did not converge");
            sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Signing seed of node `i`.
pub fn seed(i: usize) -> [u8; 32] {
    [i as u8 + 1; 32]
}

/// Id of node `i`.
pub fn node_id(i: usize) -> NodeId {
    KeyPair::from_seed(seed(i)).public_key().into()
}

/// A deployer key distinct from every node key.
pub fn deployer(n: u8) -> KeyPair {
    KeyPair::from_seed([200u8.wrapping_add(n); 32])
}
