//! # Registry State
//!
//! Name records keyed in a `BTreeMap` so iteration order (and therefore the
//! canonical encoding) is the same on every node.

use super::errors::StateError;
use super::snapshot::StateImage;
use super::validation::{validate_operation, validate_proposal};
use serde::{Deserialize, Serialize};
use shared_crypto::context_hash;
use shared_types::encoding::{Canonical, CanonicalWriter};
use shared_types::{
    ClusterConfig, Deployment, Digest, Identity, LogEntry, NodeId, Operation, ValidationError,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

const STATE_ROOT_CONTEXT: &str = "web-registry state root v1";

/// What the registry holds for a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameRecord {
    /// Deployed and served.
    Live(Deployment),
    /// Removed; owner and version are kept so the name cannot be taken over
    /// or rolled back.
    Removed {
        owner: Identity,
        version: u64,
        removed_at: u64,
    },
}

impl NameRecord {
    /// Identity that controls the name.
    pub fn owner(&self) -> &Identity {
        match self {
            Self::Live(d) => &d.owner,
            Self::Removed { owner, .. } => owner,
        }
    }

    /// Last committed version.
    pub fn version(&self) -> u64 {
        match self {
            Self::Live(d) => d.version,
            Self::Removed { version, .. } => *version,
        }
    }

    /// Live deployment, if any.
    pub fn deployment(&self) -> Option<&Deployment> {
        match self {
            Self::Live(d) => Some(d),
            Self::Removed { .. } => None,
        }
    }
}

impl Canonical for NameRecord {
    fn encode(&self, w: &mut CanonicalWriter) {
        match self {
            Self::Live(d) => {
                w.put_tag(1);
                d.encode(w);
            }
            Self::Removed {
                owner,
                version,
                removed_at,
            } => {
                w.put_tag(2)
                    .put_fixed(&owner.0)
                    .put_u64(*version)
                    .put_u64(*removed_at);
            }
        }
    }
}

/// Result of applying one committed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Registry updated.
    Applied,
    /// Membership replaced.
    ConfigChanged { version: u64, members: usize },
    /// Entry failed validation; only the height moved.
    Rejected(ValidationError),
    /// Entry was already folded in (replay overlap).
    AlreadyApplied,
}

/// The registry at some committed height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryState {
    pub(crate) height: u64,
    pub(crate) genesis_hash: Digest,
    pub(crate) config: ClusterConfig,
    pub(crate) names: BTreeMap<String, NameRecord>,
    pub(crate) rejected_entries: u64,
}

impl RegistryState {
    /// Empty registry under the genesis configuration.
    pub fn genesis(config: ClusterConfig) -> Self {
        Self {
            height: 0,
            genesis_hash: config.digest(),
            config,
            names: BTreeMap::new(),
            rejected_entries: 0,
        }
    }

    /// Rebuild by folding `entries` over the genesis state.
    pub fn replay<'a, I>(genesis: ClusterConfig, entries: I) -> Result<Self, StateError>
    where
        I: IntoIterator<Item = &'a LogEntry>,
    {
        let mut state = Self::genesis(genesis);
        state.apply_all(entries)?;
        Ok(state)
    }

    /// Apply `entries` in order.
    pub fn apply_all<'a, I>(&mut self, entries: I) -> Result<(), StateError>
    where
        I: IntoIterator<Item = &'a LogEntry>,
    {
        for entry in entries {
            self.apply(entry)?;
        }
        Ok(())
    }

    /// Number of entries folded in.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Configuration in force at this height.
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Digest of the genesis configuration.
    pub fn genesis_hash(&self) -> Digest {
        self.genesis_hash
    }

    /// Record for `name`, live or removed.
    pub fn record(&self, name: &str) -> Option<&NameRecord> {
        self.names.get(name)
    }

    /// Live deployment for `name` and the height it was read at.
    pub fn get(&self, name: &str) -> Option<(&Deployment, u64)> {
        self.names
            .get(name)
            .and_then(NameRecord::deployment)
            .map(|d| (d, self.height))
    }

    /// Live deployments in name order, optionally for one owner.
    pub fn list(&self, owner: Option<&Identity>) -> Vec<Deployment> {
        self.names
            .values()
            .filter_map(NameRecord::deployment)
            .filter(|d| owner.map_or(true, |o| &d.owner == o))
            .cloned()
            .collect()
    }

    /// Smallest version a new deploy or removal of `name` may use.
    pub fn next_version(&self, name: &str) -> u64 {
        self.names.get(name).map_or(1, |r| r.version() + 1)
    }

    /// Number of live deployments.
    pub fn deployment_count(&self) -> usize {
        self.names.values().filter(|r| r.deployment().is_some()).count()
    }

    /// Committed entries that were rejected on apply.
    pub fn rejected_entries(&self) -> u64 {
        self.rejected_entries
    }

    /// Admission check at the current height.
    pub fn validate(&self, operation: &Operation) -> Result<(), ValidationError> {
        validate_operation(self, operation)
    }

    /// Admission check including the proposer's right to propose it.
    pub fn validate_proposal(
        &self,
        operation: &Operation,
        proposer: &NodeId,
    ) -> Result<(), ValidationError> {
        validate_proposal(self, operation, proposer)
    }

    /// Fold one committed entry.
    ///
    /// Entries below the height are ignored; entries above it are refused.
    pub fn apply(&mut self, entry: &LogEntry) -> Result<ApplyOutcome, StateError> {
        if entry.index < self.height {
            return Ok(ApplyOutcome::AlreadyApplied);
        }
        if entry.index > self.height {
            return Err(StateError::OutOfOrder {
                expected: self.height,
                got: entry.index,
            });
        }

        if let Err(reason) = self.validate_proposal(&entry.operation, &entry.proposer) {
            warn!(index = entry.index, %reason, "Committed entry rejected on apply");
            self.height += 1;
            self.rejected_entries += 1;
            return Ok(ApplyOutcome::Rejected(reason));
        }

        let outcome = match &entry.operation {
            Operation::Deploy(intent) => {
                let deployment = Deployment {
                    name: intent.name.clone(),
                    owner: intent.owner,
                    digest: intent.digest,
                    version: intent.version,
                    timestamp: entry.timestamp,
                    description: intent.description.clone(),
                    committed_at: entry.index,
                };
                debug!(index = entry.index, name = %intent.name, version = intent.version, "Deploy applied");
                self.names
                    .insert(intent.name.clone(), NameRecord::Live(deployment));
                ApplyOutcome::Applied
            }
            Operation::Remove(intent) => {
                debug!(index = entry.index, name = %intent.name, "Remove applied");
                self.names.insert(
                    intent.name.clone(),
                    NameRecord::Removed {
                        owner: intent.owner,
                        version: intent.version,
                        removed_at: entry.index,
                    },
                );
                ApplyOutcome::Applied
            }
            Operation::Reconfigure(config) => {
                info!(
                    index = entry.index,
                    version = config.version,
                    members = config.member_count(),
                    "Cluster configuration replaced"
                );
                self.config = config.clone();
                ApplyOutcome::ConfigChanged {
                    version: config.version,
                    members: config.member_count(),
                }
            }
        };
        self.height += 1;
        Ok(outcome)
    }

    /// Canonical bytes of the whole state.
    pub fn encode(&self) -> Vec<u8> {
        self.canonical_bytes()
    }

    /// BLAKE3 digest of [`Self::encode`].
    pub fn state_root(&self) -> Digest {
        Digest(context_hash(STATE_ROOT_CONTEXT, &self.encode()))
    }

    /// Snapshot payload and the root it must restore to.
    pub fn snapshot(&self) -> Result<(Vec<u8>, Digest), StateError> {
        Ok((StateImage::from_state(self).to_bytes()?, self.state_root()))
    }

    /// Rebuild from a snapshot payload, checking root and genesis.
    pub fn restore(
        payload: &[u8],
        expected_root: &Digest,
        genesis_hash: &Digest,
    ) -> Result<Self, StateError> {
        let state = StateImage::from_bytes(payload)?.into_state();
        if &state.genesis_hash != genesis_hash {
            return Err(StateError::GenesisMismatch);
        }
        if &state.state_root() != expected_root {
            return Err(StateError::RootMismatch {
                height: state.height,
            });
        }
        Ok(state)
    }
}

impl Canonical for RegistryState {
    fn encode(&self, w: &mut CanonicalWriter) {
        w.put_u64(self.height)
            .put_fixed(&self.genesis_hash.0)
            .put_u64(self.rejected_entries);
        self.config.encode(w);
        w.put_u64(self.names.len() as u64);
        for (name, record) in &self.names {
            w.put_str(name);
            record.encode(w);
        }
    }
}
