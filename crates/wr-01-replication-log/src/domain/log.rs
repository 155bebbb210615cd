//! # Replication Log
//!
//! In-memory index of every committed entry, written through to a
//! [`LogStore`] before the index is updated.

use super::errors::LogError;
use crate::adapters::memory::MemoryLogStore;
use crate::ports::outbound::LogStore;
use shared_types::CertifiedEntry;
use std::ops::Range;
use tracing::{debug, info};

/// The committed, certified, gap-free log.
pub struct ReplicationLog {
    entries: Vec<CertifiedEntry>,
    store: Box<dyn LogStore>,
}

impl ReplicationLog {
    /// Reload from `store`, verifying that indexes run `0..n`.
    pub fn open(mut store: Box<dyn LogStore>) -> Result<Self, LogError> {
        let entries = store.load()?;
        for (position, certified) in entries.iter().enumerate() {
            if certified.index() != position as u64 {
                return Err(LogError::Discontinuous {
                    expected: position as u64,
                    found: certified.index(),
                });
            }
        }
        info!(height = entries.len(), "Replication log opened");
        Ok(Self { entries, store })
    }

    /// Empty log backed by memory.
    pub fn in_memory() -> Self {
        Self {
            entries: Vec::new(),
            store: Box::new(MemoryLogStore::new()),
        }
    }

    /// Number of committed entries; also the next index to append.
    pub fn committed_height(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Append the entry at the current height.
    ///
    /// Any other index is an invariant violation; the log is left untouched.
    pub fn append(&mut self, certified: CertifiedEntry) -> Result<(), LogError> {
        let expected = self.committed_height();
        if certified.index() != expected {
            return Err(LogError::InvariantViolation {
                expected,
                got: certified.index(),
            });
        }
        self.store.append(&certified)?;
        debug!(index = expected, "Entry appended");
        self.entries.push(certified);
        Ok(())
    }

    /// Entries in `range`, clamped to the committed height.
    pub fn read(&self, range: Range<u64>) -> Vec<CertifiedEntry> {
        let end = range.end.min(self.committed_height());
        if range.start >= end {
            return Vec::new();
        }
        self.entries[range.start as usize..end as usize].to_vec()
    }

    /// Entry at `index`.
    pub fn get(&self, index: u64) -> Option<&CertifiedEntry> {
        self.entries.get(usize::try_from(index).ok()?)
    }

    /// Entries from `index` to the end.
    pub fn iter_from(&self, index: u64) -> impl Iterator<Item = &CertifiedEntry> {
        self.entries.iter().skip(index as usize)
    }
}

impl std::fmt::Debug for ReplicationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationLog")
            .field("height", &self.committed_height())
            .finish_non_exhaustive()
    }
}
