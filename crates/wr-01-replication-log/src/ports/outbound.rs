//! # Outbound Ports (Driven Ports)
//!
//! Durable storage the log and the snapshot scheduler depend on.
//!
//! Production: `FileLogStore`, `FileSnapshotStore`
//! Testing: `MemoryLogStore`, `MemorySnapshotStore`

use crate::domain::errors::LogError;
use crate::domain::snapshot::Snapshot;
use shared_types::CertifiedEntry;

/// Append-only storage of certified entries.
pub trait LogStore: Send + Sync {
    /// Every stored entry in append order.
    ///
    /// Called once on open; may repair a torn tail.
    fn load(&mut self) -> Result<Vec<CertifiedEntry>, LogError>;

    /// Durably append one entry.
    fn append(&mut self, entry: &CertifiedEntry) -> Result<(), LogError>;
}

/// Storage of state snapshots keyed by height.
pub trait SnapshotStore: Send + Sync {
    /// Persist `snapshot`, replacing any snapshot at the same height.
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), LogError>;

    /// Newest readable snapshot whose height is at most `height`.
    fn latest_at_or_below(&self, height: u64) -> Result<Option<Snapshot>, LogError>;

    /// Keep only the newest `keep` snapshots.
    fn prune(&mut self, keep: usize) -> Result<(), LogError>;
}
