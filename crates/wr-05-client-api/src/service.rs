//! # Client Service
//!
//! Turns client calls into proposals and local reads.
//!
//! A write returns once the *local* registry reflects the commit, so a
//! `get` on the same node right after `deploy` sees the new version. The
//! wait is bounded by `deploy_timeout`; giving up does not withdraw the
//! proposal, which may still commit later.

use crate::domain::{
    ClientConfig, ClientError, DeployReceipt, DeployRequest, GetResponse, RegistryInfo,
    RemoveReceipt, RemoveRequest,
};
use crate::ports::{BundleStore, LocatorDeriver, NodeStatus, ProposalSubmitter, SubmitError};
use registry_telemetry::metrics::DEPLOY_DURATION;
use shared_crypto::KeyPair;
use shared_types::{ContentDigest, DeployIntent, Deployment, Identity, Operation, SyncState};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;
use wr_02_state_store::RegistryQueries;

/// Collaborators of [`ClientService`].
#[derive(Clone)]
pub struct ClientPorts {
    pub submitter: Arc<dyn ProposalSubmitter>,
    pub registry: Arc<dyn RegistryQueries>,
    pub status: Arc<dyn NodeStatus>,
    pub locator: Arc<dyn LocatorDeriver>,
    pub bundles: Arc<dyn BundleStore>,
}

/// Client-facing registry operations of one node.
pub struct ClientService {
    config: ClientConfig,
    ports: ClientPorts,
}

impl ClientService {
    pub fn new(config: ClientConfig, ports: ClientPorts) -> Self {
        Self { config, ports }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Deploy with the deployer's key: picks the next version, signs, and
    /// submits.
    pub async fn deploy(
        &self,
        name: &str,
        digest: ContentDigest,
        description: Option<String>,
        deployer: &KeyPair,
    ) -> Result<DeployReceipt, ClientError> {
        let owner = Identity::from(deployer.public_key());
        if let Some((live, _)) = self.ports.registry.lookup(name) {
            if live.owner == owner && live.digest == digest && live.description == description {
                debug!(name, version = live.version, "Deploy retry matches live deployment");
                return Ok(self.receipt(&live.name, live.owner, live.version, live.committed_at));
            }
        }
        let version = self.ports.registry.next_version_for(name);
        let intent = DeployIntent::signed(name, digest, version, description, deployer);
        self.deploy_signed(intent.into()).await
    }

    /// Deploy a request signed elsewhere.
    pub async fn deploy_signed(&self, request: DeployRequest) -> Result<DeployReceipt, ClientError> {
        let intent = request.intent;
        let request_id = Uuid::new_v4();

        if let Some(receipt) = self.committed_receipt(&intent) {
            debug!(%request_id, name = %intent.name, index = receipt.index, "Deploy already committed");
            return Ok(receipt);
        }

        let operation = Operation::Deploy(intent.clone());
        self.admit(&operation)?;
        let token = self
            .ports
            .bundles
            .store_bundle(&intent.digest)
            .await
            .map_err(|e| ClientError::BundleUnavailable(e.to_string()))?;
        debug!(%request_id, name = %intent.name, location = %token.0, "Bundle stored");

        let started = Instant::now();
        let index = self.commit(operation, &intent.name).await?;
        DEPLOY_DURATION.observe(started.elapsed().as_secs_f64());
        info!(
            %request_id,
            name = %intent.name,
            version = intent.version,
            index,
            "Deployment committed"
        );
        Ok(self.receipt(&intent.name, intent.owner, intent.version, index))
    }

    /// Take a name offline.
    pub async fn remove(&self, request: RemoveRequest) -> Result<RemoveReceipt, ClientError> {
        let intent = request.intent;
        let operation = Operation::Remove(intent.clone());
        self.admit(&operation)?;

        let index = self.commit(operation, &intent.name).await?;
        info!(name = %intent.name, version = intent.version, index, "Deployment removed");
        Ok(RemoveReceipt {
            name: intent.name,
            version: intent.version,
            index,
        })
    }

    /// Local read; never waits for a quorum.
    pub fn get(&self, name: &str) -> Result<GetResponse, ClientError> {
        let (descriptor, as_of_height) =
            self.ports
                .registry
                .lookup(name)
                .ok_or_else(|| ClientError::NotFound {
                    name: name.to_string(),
                })?;
        Ok(GetResponse {
            descriptor,
            as_of_height,
            sync_state: self.ports.status.sync_state(),
        })
    }

    /// Live deployments, optionally of one owner.
    pub fn list(&self, owner: Option<&Identity>) -> Vec<Deployment> {
        self.ports.registry.list_deployments(owner)
    }

    pub fn info(&self) -> RegistryInfo {
        let registry = &self.ports.registry;
        let config = registry.cluster_config();
        RegistryInfo {
            node_id: self.ports.status.node_id(),
            height: registry.applied_height(),
            state_root: registry.root(),
            sync_state: self.ports.status.sync_state(),
            config_version: config.version,
            members: config.member_count(),
            deployment_count: registry.list_deployments(None).len(),
        }
    }

    /// Receipt for an identical intent that is already live.
    fn committed_receipt(&self, intent: &DeployIntent) -> Option<DeployReceipt> {
        let (live, _) = self.ports.registry.lookup(&intent.name)?;
        let identical = live.owner == intent.owner
            && live.digest == intent.digest
            && live.version == intent.version
            && live.description == intent.description;
        identical.then(|| self.receipt(&intent.name, intent.owner, intent.version, live.committed_at))
    }

    fn admit(&self, operation: &Operation) -> Result<(), ClientError> {
        if self.ports.status.sync_state() == SyncState::Halted {
            return Err(ClientError::Unavailable("node halted".into()));
        }
        self.ports
            .registry
            .precheck(operation)
            .map_err(ClientError::from)
    }

    /// Submit and wait until the local state has applied the entry.
    async fn commit(&self, operation: Operation, name: &str) -> Result<u64, ClientError> {
        let mut heights = self.ports.status.applied_heights();
        let submitter = Arc::clone(&self.ports.submitter);
        let wait = async move {
            let index = submitter.submit(operation).await.map_err(|e| match e {
                SubmitError::Rejected(v) => ClientError::from(v),
                SubmitError::QuorumTimeout { attempts } => ClientError::ProposalTimeout {
                    name: name.to_string(),
                    reason: format!("no quorum after {attempts} attempts"),
                },
                SubmitError::Unavailable(reason) => ClientError::Unavailable(reason),
            })?;
            heights
                .wait_for(|height| *height > index)
                .await
                .map_err(|_| ClientError::Unavailable("node stopped".into()))?;
            Ok(index)
        };

        match timeout(self.config.deploy_timeout(), wait).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::ProposalTimeout {
                name: name.to_string(),
                reason: format!("no local commit within {} ms", self.config.deploy_timeout_ms),
            }),
        }
    }

    fn receipt(&self, name: &str, owner: Identity, version: u64, index: u64) -> DeployReceipt {
        DeployReceipt {
            locator: self.ports.locator.url_for(name, &owner),
            name: name.to_string(),
            owner,
            version,
            index,
        }
    }
}
