//! # Registry Events
//!
//! Everything a subsystem may announce on the node-local bus.

use serde::{Deserialize, Serialize};
use shared_types::entities::{Digest, NodeId, OperationKind, SyncState};

/// Subsystem ids used as event sources.
pub mod source {
    /// Node runtime (commit pipeline, liveness).
    pub const RUNTIME: u8 = 0;
    /// Replication log.
    pub const LOG: u8 = 1;
    /// State store.
    pub const STATE: u8 = 2;
    /// Consensus engine.
    pub const CONSENSUS: u8 = 3;
    /// Catch-up manager.
    pub const CATCH_UP: u8 = 4;
}

/// All events that can be published to the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// An entry was appended to the log and applied to the state.
    EntryCommitted {
        index: u64,
        kind: OperationKind,
        name: Option<String>,
        entry_digest: Digest,
        state_root: Digest,
    },

    /// A committed entry failed validation on apply and left the state
    /// unchanged (height still advanced).
    EntryRejectedOnApply { index: u64, reason: String },

    /// A `Reconfigure` entry changed the membership.
    ConfigChanged { version: u64, members: usize },

    /// The catch-up state machine moved.
    SyncStateChanged { from: SyncState, to: SyncState },

    /// A proposal round gave up and will be retried.
    RoundAbandoned {
        index: u64,
        round: u64,
        reason: String,
    },

    /// Liveness monitor saw a peer come or go.
    PeerReachability { peer: NodeId, reachable: bool },

    /// The node stopped after a log invariant violation.
    NodeHalted { reason: String },
}

/// Coarse routing key for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Committed entries and config changes.
    Commits,
    /// Catch-up transitions.
    Sync,
    /// Round-level consensus progress.
    Consensus,
    /// Peer liveness.
    Peers,
    /// Node lifecycle.
    Lifecycle,
    /// Everything.
    All,
}

impl RegistryEvent {
    /// Topic of this event.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::EntryCommitted { .. }
            | Self::EntryRejectedOnApply { .. }
            | Self::ConfigChanged { .. } => EventTopic::Commits,
            Self::SyncStateChanged { .. } => EventTopic::Sync,
            Self::RoundAbandoned { .. } => EventTopic::Consensus,
            Self::PeerReachability { .. } => EventTopic::Peers,
            Self::NodeHalted { .. } => EventTopic::Lifecycle,
        }
    }

    /// Subsystem that emits this event.
    #[must_use]
    pub fn source_subsystem(&self) -> u8 {
        match self {
            Self::EntryCommitted { .. } | Self::EntryRejectedOnApply { .. } => source::RUNTIME,
            Self::ConfigChanged { .. } => source::STATE,
            Self::SyncStateChanged { .. } => source::CATCH_UP,
            Self::RoundAbandoned { .. } => source::CONSENSUS,
            Self::PeerReachability { .. } | Self::NodeHalted { .. } => source::RUNTIME,
        }
    }
}

/// Subscription filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Source subsystems to include. Empty means all sources.
    pub source_subsystems: Vec<u8>,
}

impl EventFilter {
    /// Accept all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Accept only the given topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            source_subsystems: Vec::new(),
        }
    }

    /// Accept only events from the given subsystems.
    #[must_use]
    pub fn from_subsystems(subsystems: Vec<u8>) -> Self {
        Self {
            topics: Vec::new(),
            source_subsystems: subsystems,
        }
    }

    /// Whether `event` passes this filter.
    #[must_use]
    pub fn matches(&self, event: &RegistryEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let source_match = self.source_subsystems.is_empty()
            || self.source_subsystems.contains(&event.source_subsystem());

        topic_match && source_match
    }
}
