//! # Inbound Query API
//!
//! Read-only view used by the client interface and the catch-up sink.

use crate::domain::registry::RegistryState;
use shared_types::{ClusterConfig, Deployment, Digest, Identity, Operation, ValidationError};

/// Read access to registry state.
pub trait RegistryQueries: Send + Sync {
    /// Live deployment and the height it was read at.
    fn lookup(&self, name: &str) -> Option<(Deployment, u64)>;

    /// Live deployments, optionally filtered by owner.
    fn list_deployments(&self, owner: Option<&Identity>) -> Vec<Deployment>;

    /// Next admissible version for `name`.
    fn next_version_for(&self, name: &str) -> u64;

    /// Applied height.
    fn applied_height(&self) -> u64;

    /// Current state root.
    fn root(&self) -> Digest;

    /// Configuration in force.
    fn cluster_config(&self) -> ClusterConfig;

    /// Would `operation` be admitted at the applied height?
    fn precheck(&self, operation: &Operation) -> Result<(), ValidationError>;
}

impl RegistryQueries for RegistryState {
    fn lookup(&self, name: &str) -> Option<(Deployment, u64)> {
        self.get(name).map(|(d, h)| (d.clone(), h))
    }

    fn list_deployments(&self, owner: Option<&Identity>) -> Vec<Deployment> {
        self.list(owner)
    }

    fn next_version_for(&self, name: &str) -> u64 {
        self.next_version(name)
    }

    fn applied_height(&self) -> u64 {
        self.height()
    }

    fn root(&self) -> Digest {
        self.state_root()
    }

    fn cluster_config(&self) -> ClusterConfig {
        self.config().clone()
    }

    fn precheck(&self, operation: &Operation) -> Result<(), ValidationError> {
        self.validate(operation)
    }
}
