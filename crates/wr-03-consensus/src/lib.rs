//! # Consensus Engine (wr-03)
//!
//! Turns client operations into one cluster-agreed sequence of log entries.
//!
//! ## Round Structure
//!
//! Each log index is decided by a single-decree round driven by whichever
//! member holds an operation:
//!
//! ```text
//!  Proposer                          Voters (incl. proposer)
//!  ────────                          ───────────────────────
//!  Prepare(i, (r, me))  ───────────→  promise if i == height, caught up,
//!                       ←───────────  and (r, me) > promised; report accepted
//!  Propose(i, r, op, me, ts) ──────→  accept if ballot >= promise and op valid
//!                       ←───────────  Vote + signature over entry digest
//!  quorum of votes ⇒ CommitCertificate
//!  local pipeline ← Commit ────────→  peers append without revoting
//! ```
//!
//! If any promise reports an accepted proposal, the proposer finishes that
//! entry first and retries its own operation at the next index.
//!
//! ## What Is Agreed
//!
//! The value decided at an index is the operation together with its
//! timestamp. `round` and `proposer` on a [`shared_types::LogEntry`] name the
//! ballot that carried it to a quorum, so finishing an adopted entry restamps
//! them with the finishing ballot. Two certificates for one index can
//! therefore differ in entry digest, but never in what is applied: registry
//! state depends only on index, operation and timestamp.
//!
//! ## Failure Handling
//!
//! | Situation | Behaviour |
//! |-----------|-----------|
//! | No quorum within `round_timeout` | Round abandoned, retried with backoff and jitter |
//! | `max_attempts` exhausted | [`ConsensusError::QuorumTimeout`] |
//! | Quorum rejects on validation | [`ConsensusError::Validation`] immediately |
//! | Voters report a higher height | Catch-up is signalled, round retried |
//! | Node not caught up | Votes refused, proposer stalls ([`ConsensusError::PartitionStall`]) |
//! | Node halted | Every call answers `Halted` |
//!
//! ## Usage
//!
//! ```rust,ignore
//! let engine = Arc::new(ConsensusEngine::new(key, ConsensusConfig::default(), ports));
//! let driver = engine.spawn_driver(shutdown_rx);
//!
//! let handle = engine.submit(operation).await?;
//! let committed = handle.wait().await?;
//! ```

pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;

pub use domain::{
    backoff_delay, ConsensusConfig, ConsensusError, PromiseTally, Slot, VoteTally, VoterLedger,
};
pub use ports::{CommitSink, ConsensusApi, LagSignal, PeerDirectory, RegistryView};
pub use service::{Committed, ConsensusEngine, ConsensusPorts, ProposalHandle};
