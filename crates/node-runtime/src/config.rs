//! # Node Configuration
//!
//! One TOML file per node, with `WR_*` environment overrides applied on top.
//!
//! ```toml
//! [node]
//! key_seed = "0101...01"          # 32-byte hex seed of the node key
//! data_dir = "/var/lib/wr"        # omit for an in-memory node
//!
//! [network]
//! peer_listen = "0.0.0.0:7100"
//! client_listen = "0.0.0.0:7200"
//!
//! [[genesis.peers]]
//! id = "8a88e3dd..."              # node public key, hex
//! address = "http://10.0.0.1:7100"
//!
//! [consensus]
//! round_timeout_ms = 1000
//!
//! [catch_up]
//! batch_size = 256
//!
//! [storage]
//! snapshot_interval = 1024
//!
//! [client]
//! deploy_timeout_ms = 30000
//! ```

use serde::{Deserialize, Serialize};
use shared_crypto::KeyPair;
use shared_types::{ClusterConfig, Identity, NodeId, PeerInfo};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use wr_03_consensus::ConsensusConfig;
use wr_04_catch_up::CatchUpConfig;
use wr_05_client_api::ClientConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Invalid TOML: {0}")]
    Parse(String),

    #[error("Environment variable {var}: {reason}")]
    Env { var: &'static str, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeSection,
    pub network: NetworkConfig,
    pub genesis: GenesisConfig,
    pub consensus: ConsensusConfig,
    pub catch_up: CatchUpConfig,
    pub liveness: LivenessConfig,
    pub storage: StorageConfig,
    pub client: ClientConfig,
}

/// Identity and persistence of this node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Hex seed of the node's signing key.
    pub key_seed: String,
    /// Directory for the log and snapshots; `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
}

/// Listen addresses and peer request limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub peer_listen: String,
    pub client_listen: String,
    /// Timeout of one outgoing peer request.
    pub request_timeout_ms: u64,
    /// Most entries served per `FetchEntries` call.
    pub max_fetch_entries: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            peer_listen: "127.0.0.1:7100".to_string(),
            client_listen: "127.0.0.1:7200".to_string(),
            request_timeout_ms: 2_000,
            max_fetch_entries: 1_024,
        }
    }
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// One genesis member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisPeer {
    pub id: NodeId,
    pub address: String,
}

/// Genesis configuration, identical on every node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    pub peers: Vec<GenesisPeer>,
    pub deployer_allowlist: Option<Vec<Identity>>,
}

impl GenesisConfig {
    /// Version-0 cluster configuration.
    pub fn cluster_config(&self) -> ClusterConfig {
        let mut config = ClusterConfig::genesis(
            self.peers
                .iter()
                .map(|p| PeerInfo {
                    id: p.id,
                    address: p.address.clone(),
                })
                .collect(),
        );
        config.deployer_allowlist = self.deployer_allowlist.clone();
        config
    }
}

/// Status heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Period of the status log line and gauge refresh.
    pub heartbeat_ms: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self { heartbeat_ms: 5_000 }
    }
}

impl LivenessConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }
}

/// Persistence tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Take a state snapshot every this many commits; 0 disables snapshots.
    pub snapshot_interval: u64,
    /// Snapshots kept on disk.
    pub snapshots_kept: usize,
    /// fsync every appended record.
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 1_024,
            snapshots_kept: 2,
            sync_writes: true,
        }
    }
}

impl NodeConfig {
    /// Read `path` and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut config = Self::from_toml(&text)?;
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `WR_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        fn number(var: &'static str, value: String) -> Result<u64, ConfigError> {
            value.parse().map_err(|_| ConfigError::Env {
                var,
                reason: format!("{value:?} is not a number"),
            })
        }

        if let Some(seed) = lookup("WR_KEY_SEED") {
            self.node.key_seed = seed;
        }
        if let Some(dir) = lookup("WR_DATA_DIR") {
            self.node.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(addr) = lookup("WR_PEER_LISTEN") {
            self.network.peer_listen = addr;
        }
        if let Some(addr) = lookup("WR_CLIENT_LISTEN") {
            self.network.client_listen = addr;
        }
        if let Some(value) = lookup("WR_DEPLOY_TIMEOUT_MS") {
            self.client.deploy_timeout_ms = number("WR_DEPLOY_TIMEOUT_MS", value)?;
        }
        if let Some(value) = lookup("WR_SNAPSHOT_INTERVAL") {
            self.storage.snapshot_interval = number("WR_SNAPSHOT_INTERVAL", value)?;
        }
        if let Some(value) = lookup("WR_ROUND_TIMEOUT_MS") {
            self.consensus.round_timeout_ms = number("WR_ROUND_TIMEOUT_MS", value)?;
        }
        Ok(())
    }

    /// Decode the node key.
    pub fn key_pair(&self) -> Result<KeyPair, ConfigError> {
        KeyPair::from_seed_hex(&self.node.key_seed)
            .map_err(|e| ConfigError::Invalid(format!("node.key_seed: {e}")))
    }

    /// Check everything that would otherwise fail at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.key_pair()?;
        self.genesis
            .cluster_config()
            .validate_shape()
            .map_err(|e| ConfigError::Invalid(format!("genesis: {e}")))?;
        if self.consensus.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "consensus.max_attempts must be positive".into(),
            ));
        }
        if self.consensus.backoff_base_ms > self.consensus.backoff_max_ms {
            return Err(ConfigError::Invalid(
                "consensus.backoff_base_ms exceeds backoff_max_ms".into(),
            ));
        }
        if self.catch_up.batch_size == 0 || self.catch_up.min_batch_size > self.catch_up.batch_size {
            return Err(ConfigError::Invalid(
                "catch_up.batch_size must be positive and at least min_batch_size".into(),
            ));
        }
        if self.catch_up.max_sync_rounds == 0 {
            return Err(ConfigError::Invalid(
                "catch_up.max_sync_rounds must be positive".into(),
            ));
        }
        if self.network.max_fetch_entries == 0 {
            return Err(ConfigError::Invalid(
                "network.max_fetch_entries must be positive".into(),
            ));
        }
        self.client
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("client: {e}")))?;
        Ok(())
    }

    /// In-memory node with short timeouts over the given genesis.
    pub fn for_testing(key_seed: [u8; 32], genesis: Vec<GenesisPeer>) -> Self {
        Self {
            node: NodeSection {
                key_seed: hex_seed(&key_seed),
                data_dir: None,
            },
            network: NetworkConfig {
                request_timeout_ms: 500,
                ..NetworkConfig::default()
            },
            genesis: GenesisConfig {
                peers: genesis,
                deployer_allowlist: None,
            },
            consensus: ConsensusConfig::for_testing(),
            catch_up: CatchUpConfig::for_testing(),
            liveness: LivenessConfig { heartbeat_ms: 200 },
            storage: StorageConfig {
                snapshot_interval: 8,
                snapshots_kept: 2,
                sync_writes: false,
            },
            client: ClientConfig::for_testing(),
        }
    }
}

fn hex_seed(seed: &[u8; 32]) -> String {
    seed.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(seed: u8) -> GenesisPeer {
        GenesisPeer {
            id: KeyPair::from_seed([seed; 32]).public_key().into(),
            address: format!("http://127.0.0.1:71{seed:02}"),
        }
    }

    #[test]
    fn test_testing_config_is_valid() {
        let config = NodeConfig::for_testing([1; 32], vec![peer(1), peer(2), peer(3)]);
        assert!(config.validate().is_ok());
        assert_eq!(
            NodeId::from(config.key_pair().unwrap().public_key()),
            peer(1).id
        );
    }

    #[test]
    fn test_toml_sections_and_defaults() {
        let id = peer(1).id.to_hex();
        let text = format!(
            r#"
            [node]
            key_seed = "{seed}"

            [[genesis.peers]]
            id = "{id}"
            address = "http://127.0.0.1:7101"

            [consensus]
            round_timeout_ms = 300

            [storage]
            snapshot_interval = 16
            "#,
            seed = hex_seed(&[1; 32]),
        );
        let config = NodeConfig::from_toml(&text).unwrap();
        assert_eq!(config.consensus.round_timeout_ms, 300);
        assert_eq!(config.consensus.max_attempts, ConsensusConfig::default().max_attempts);
        assert_eq!(config.storage.snapshot_interval, 16);
        assert_eq!(config.genesis.peers.len(), 1);
        assert_eq!(config.catch_up, CatchUpConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = NodeConfig::for_testing([1; 32], vec![peer(1)]);
        config
            .apply_overrides(|var| match var {
                "WR_DATA_DIR" => Some("/tmp/wr".into()),
                "WR_SNAPSHOT_INTERVAL" => Some("64".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.node.data_dir, Some(PathBuf::from("/tmp/wr")));
        assert_eq!(config.storage.snapshot_interval, 64);

        let err = config
            .apply_overrides(|var| (var == "WR_DEPLOY_TIMEOUT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "WR_DEPLOY_TIMEOUT_MS", .. }));
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let mut config = NodeConfig::for_testing([1; 32], vec![peer(1), peer(1)]);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.genesis.peers = vec![peer(1)];
        config.node.key_seed = "zz".into();
        assert!(config.validate().is_err());

        config.node.key_seed = hex_seed(&[1; 32]);
        config.consensus.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
