//! In-memory stores for tests and diskless nodes.

use crate::domain::errors::LogError;
use crate::domain::snapshot::Snapshot;
use crate::ports::outbound::{LogStore, SnapshotStore};
use shared_types::CertifiedEntry;
use std::collections::BTreeMap;

/// Log store that keeps records in a `Vec`.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    records: Vec<CertifiedEntry>,
}

impl MemoryLogStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with `records` (restart simulations).
    pub fn with_records(records: Vec<CertifiedEntry>) -> Self {
        Self { records }
    }
}

impl LogStore for MemoryLogStore {
    fn load(&mut self) -> Result<Vec<CertifiedEntry>, LogError> {
        Ok(self.records.clone())
    }

    fn append(&mut self, entry: &CertifiedEntry) -> Result<(), LogError> {
        self.records.push(entry.clone());
        Ok(())
    }
}

/// Snapshot store keyed by height in a `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: BTreeMap<u64, Snapshot>,
}

impl MemorySnapshotStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Heights currently stored.
    pub fn heights(&self) -> Vec<u64> {
        self.snapshots.keys().copied().collect()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), LogError> {
        self.snapshots.insert(snapshot.height, snapshot.clone());
        Ok(())
    }

    fn latest_at_or_below(&self, height: u64) -> Result<Option<Snapshot>, LogError> {
        Ok(self
            .snapshots
            .range(..=height)
            .next_back()
            .map(|(_, s)| s.clone()))
    }

    fn prune(&mut self, keep: usize) -> Result<(), LogError> {
        while self.snapshots.len() > keep {
            self.snapshots.pop_first();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Digest;

    fn snapshot(height: u64) -> Snapshot {
        Snapshot {
            height,
            state_root: Digest([height as u8; 32]),
            payload: vec![height as u8],
        }
    }

    #[test]
    fn test_latest_at_or_below() {
        let mut store = MemorySnapshotStore::new();
        for h in [10, 20, 30] {
            store.save(&snapshot(h)).unwrap();
        }
        assert_eq!(store.latest_at_or_below(25).unwrap().unwrap().height, 20);
        assert_eq!(store.latest_at_or_below(30).unwrap().unwrap().height, 30);
        assert!(store.latest_at_or_below(5).unwrap().is_none());
    }

    #[test]
    fn test_prune_keeps_newest() {
        let mut store = MemorySnapshotStore::new();
        for h in [10, 20, 30] {
            store.save(&snapshot(h)).unwrap();
        }
        store.prune(2).unwrap();
        assert_eq!(store.heights(), vec![20, 30]);
    }
}
