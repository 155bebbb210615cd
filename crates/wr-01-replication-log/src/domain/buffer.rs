//! # Commit Buffer
//!
//! Certified entries can arrive ahead of their predecessors: a commit
//! broadcast overtakes an older one, or a catch-up batch lands while live
//! commits keep flowing. The buffer is an arena keyed by index that holds
//! them until the gap closes, so the writer only ever sees the contiguous
//! run starting at its own height.
//!
//! ## Security
//!
//! - Bounded to `max_entries`
//! - Entries more than `max_lookahead` past the height are refused

use shared_types::CertifiedEntry;
use std::collections::BTreeMap;

/// Limits for [`CommitBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// Maximum buffered entries.
    pub max_entries: usize,
    /// Maximum distance between the height and a buffered index.
    pub max_lookahead: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_entries: 4096,
            max_lookahead: 8192,
        }
    }
}

/// What happened to an offered entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    /// Stored until its turn.
    Buffered,
    /// Index already committed.
    Stale,
    /// Same index already buffered with the same digest.
    Duplicate,
    /// Same index already buffered with a different digest; the first wins.
    Conflict,
    /// Too far past the height.
    TooFarAhead,
    /// Buffer at capacity.
    Full,
}

/// Arena of certified entries keyed by index.
#[derive(Debug)]
pub struct CommitBuffer {
    pending: BTreeMap<u64, CertifiedEntry>,
    config: BufferConfig,
}

impl CommitBuffer {
    /// Empty buffer.
    pub fn new(config: BufferConfig) -> Self {
        Self {
            pending: BTreeMap::new(),
            config,
        }
    }

    /// Empty buffer with default limits.
    pub fn with_defaults() -> Self {
        Self::new(BufferConfig::default())
    }

    /// Offer `certified` while the writer is at `height`.
    pub fn offer(&mut self, certified: CertifiedEntry, height: u64) -> OfferOutcome {
        let index = certified.index();
        if index < height {
            return OfferOutcome::Stale;
        }
        if index - height > self.config.max_lookahead {
            return OfferOutcome::TooFarAhead;
        }
        if let Some(existing) = self.pending.get(&index) {
            return if existing.certificate.entry_digest == certified.certificate.entry_digest {
                OfferOutcome::Duplicate
            } else {
                OfferOutcome::Conflict
            };
        }
        if self.pending.len() >= self.config.max_entries {
            return OfferOutcome::Full;
        }
        self.pending.insert(index, certified);
        OfferOutcome::Buffered
    }

    /// Remove and return the entry at `height`, if buffered.
    pub fn take_next(&mut self, height: u64) -> Option<CertifiedEntry> {
        self.pending.remove(&height)
    }

    /// Drop everything below `height`.
    pub fn discard_below(&mut self, height: u64) {
        self.pending = self.pending.split_off(&height);
    }

    /// Drop one buffered entry (after it failed verification).
    pub fn discard(&mut self, index: u64) -> Option<CertifiedEntry> {
        self.pending.remove(&index)
    }

    /// Lowest buffered index.
    pub fn lowest_index(&self) -> Option<u64> {
        self.pending.keys().next().copied()
    }

    /// Highest buffered index.
    pub fn highest_index(&self) -> Option<u64> {
        self.pending.keys().next_back().copied()
    }

    /// Whether buffered entries are waiting on a missing predecessor.
    pub fn has_gap(&self, height: u64) -> bool {
        self.lowest_index().is_some_and(|lowest| lowest > height)
    }

    /// Number of buffered entries.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
