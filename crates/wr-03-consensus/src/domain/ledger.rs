//! # Voter Ledger
//!
//! What this node promised and accepted for each undecided index. Slots
//! below the applied height are dropped; nothing here is persisted.

use shared_types::{AcceptedProposal, Ballot, LogEntry};
use std::collections::BTreeMap;

/// Per-index voter state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slot {
    /// Highest ballot promised.
    pub promised: Option<Ballot>,
    /// Highest-ballot proposal accepted.
    pub accepted: Option<AcceptedProposal>,
    /// Highest round observed from any proposer.
    pub highest_round: u64,
}

/// Slots keyed by log index.
#[derive(Debug, Default)]
pub struct VoterLedger {
    slots: BTreeMap<u64, Slot>,
}

impl VoterLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Promise `ballot` for `index`.
    ///
    /// Returns the accepted proposal to report, or the ballot already
    /// promised when it is not lower than `ballot`.
    pub fn promise(&mut self, index: u64, ballot: Ballot) -> Result<Option<AcceptedProposal>, Ballot> {
        let slot = self.slots.entry(index).or_default();
        slot.highest_round = slot.highest_round.max(ballot.round);
        if let Some(promised) = slot.promised {
            if promised >= ballot {
                return Err(promised);
            }
        }
        slot.promised = Some(ballot);
        Ok(slot.accepted.clone())
    }

    /// Accept `entry` under `ballot` unless a higher ballot was promised.
    pub fn accept(&mut self, index: u64, ballot: Ballot, entry: LogEntry) -> Result<(), Ballot> {
        let slot = self.slots.entry(index).or_default();
        slot.highest_round = slot.highest_round.max(ballot.round);
        if let Some(promised) = slot.promised {
            if promised > ballot {
                return Err(promised);
            }
        }
        slot.promised = Some(ballot);
        slot.accepted = Some(AcceptedProposal { ballot, entry });
        Ok(())
    }

    /// Record that some proposer used `round` at `index`.
    pub fn observe_round(&mut self, index: u64, round: u64) {
        let slot = self.slots.entry(index).or_default();
        slot.highest_round = slot.highest_round.max(round);
    }

    /// Round a new proposal for `index` should use.
    pub fn next_round(&self, index: u64) -> u64 {
        self.slots.get(&index).map_or(0, |s| s.highest_round) + 1
    }

    /// Forget decided indexes.
    pub fn prune_below(&mut self, height: u64) {
        self.slots = self.slots.split_off(&height);
    }

    pub fn slot(&self, index: u64) -> Option<&Slot> {
        self.slots.get(&index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
