//! Request and response payloads of the client API.

use serde::{Deserialize, Serialize};
use shared_types::{DeployIntent, Deployment, Digest, Identity, NodeId, RemoveIntent, SyncState};

/// A deployer-signed deploy, as received from a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    #[serde(flatten)]
    pub intent: DeployIntent,
}

impl From<DeployIntent> for DeployRequest {
    fn from(intent: DeployIntent) -> Self {
        Self { intent }
    }
}

/// A deployer-signed removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveRequest {
    #[serde(flatten)]
    pub intent: RemoveIntent,
}

impl From<RemoveIntent> for RemoveRequest {
    fn from(intent: RemoveIntent) -> Self {
        Self { intent }
    }
}

/// Answer to a successful deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployReceipt {
    /// Public URL of the deployment.
    pub locator: String,
    pub name: String,
    pub owner: Identity,
    pub version: u64,
    /// Log index of the committing entry.
    pub index: u64,
}

/// Answer to a successful removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveReceipt {
    pub name: String,
    pub version: u64,
    pub index: u64,
}

/// A local read of one name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetResponse {
    pub descriptor: Deployment,
    /// Applied height the answer was read at.
    pub as_of_height: u64,
    /// `CaughtUp` answers are current; anything else may be stale.
    pub sync_state: SyncState,
}

/// Node summary for `registry_info` and `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryInfo {
    pub node_id: NodeId,
    pub height: u64,
    pub state_root: Digest,
    pub sync_state: SyncState,
    pub config_version: u64,
    pub members: usize,
    pub deployment_count: usize,
}
