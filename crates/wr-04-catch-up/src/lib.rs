//! # Catch-Up Manager (wr-04)
//!
//! Brings a lagging, restarted or newly added node up to the cluster's
//! committed height by fetching certified entries from peers.
//!
//! ## State Machine
//!
//! ```text
//!            health from >= quorum-1 peers,
//!            best height > local
//!   Behind ───────────────────────────────→ Syncing{target}
//!     ↑  ↖ too few peers answer                 │ fetch [local, min(local+batch, target))
//!     │   ╲                                     │ verify, append, apply
//!     │    ╲──────────────────────────────────  ↓
//!     │                                      re-query target
//!     │  lag detected / partition               │ local == target
//!     └──────────────────────────────────── CaughtUp
//! ```
//!
//! `Halted` is terminal and only entered by the commit pipeline.
//!
//! ## Verification
//!
//! | Check | Where |
//! |-------|-------|
//! | Non-empty, contiguous from `local`, inside the request | [`verify_batch`] |
//! | Certificate bound to its entry (index, ballot, digest) | [`verify_batch`] |
//! | Quorum signatures against the config in force at that height | [`EntrySink`] (single writer) |
//!
//! Any failure discards the rest of the batch, benches the peer for a few
//! steps and halves the batch size.
//!
//! ## Module Structure
//!
//! ```text
//! wr-04-catch-up/
//! ├── domain/          # batch checks, peer table, errors
//! ├── ports/           # SyncSource + EntrySink
//! ├── application/     # CatchUpManager
//! └── config.rs        # CatchUpConfig
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{CatchUpManager, StepOutcome};
pub use config::CatchUpConfig;
pub use domain::{verify_batch, BatchError, CatchUpError, PeerTable};
pub use ports::{BatchRejected, EntrySink, SyncSource};
