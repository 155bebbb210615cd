//! Serializable image of a [`RegistryState`] for snapshots.

use super::errors::StateError;
use super::registry::{NameRecord, RegistryState};
use serde::{Deserialize, Serialize};
use shared_types::{ClusterConfig, Digest};

/// Owned, serde-friendly copy of the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateImage {
    pub height: u64,
    pub genesis_hash: Digest,
    pub config: ClusterConfig,
    pub names: Vec<(String, NameRecord)>,
    pub rejected_entries: u64,
}

impl StateImage {
    /// Copy `state`.
    pub fn from_state(state: &RegistryState) -> Self {
        Self {
            height: state.height,
            genesis_hash: state.genesis_hash,
            config: state.config.clone(),
            names: state
                .names
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            rejected_entries: state.rejected_entries,
        }
    }

    /// Turn back into a state.
    pub fn into_state(self) -> RegistryState {
        RegistryState {
            height: self.height,
            genesis_hash: self.genesis_hash,
            config: self.config,
            names: self.names.into_iter().collect(),
            rejected_entries: self.rejected_entries,
        }
    }

    /// bincode encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StateError> {
        bincode::serialize(self).map_err(|e| StateError::Codec(e.to_string()))
    }

    /// bincode decoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StateError> {
        bincode::deserialize(bytes).map_err(|e| StateError::Codec(e.to_string()))
    }
}
