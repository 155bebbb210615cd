//! # Replication Log (wr-01)
//!
//! The authoritative, append-only record of committed registry writes. Every
//! entry carries the commit certificate that admitted it, so the log can be
//! served to lagging peers and replayed after a restart without trusting
//! anyone.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | Gap-free | `append` accepts only `index == committed_height()` |
//! | 2 | Append-only | A committed index is never replaced or reordered |
//! | 3 | Integrity | Every durable record carries a CRC32; reload verifies it |
//! | 4 | Torn tail | A partial trailing record is truncated on reload |
//! | 5 | Bounded buffer | Out-of-order entries wait in a bounded [`CommitBuffer`] |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - the log, the commit buffer, record framing, snapshots
//! - `ports/` - [`LogStore`] and [`SnapshotStore`] driven ports
//! - `adapters/` - in-memory and file-backed stores
//!
//! ## Usage
//!
//! ```ignore
//! use wr_01_replication_log::{FileLogStore, ReplicationLog};
//!
//! let store = FileLogStore::open(data_dir.join("log.bin"))?;
//! let mut log = ReplicationLog::open(Box::new(store))?;
//! log.append(certified)?;
//! let batch = log.read(10..20);
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::file::{FileLogStore, FileSnapshotStore};
pub use adapters::memory::{MemoryLogStore, MemorySnapshotStore};
pub use domain::buffer::{BufferConfig, CommitBuffer, OfferOutcome};
pub use domain::errors::LogError;
pub use domain::log::ReplicationLog;
pub use domain::snapshot::Snapshot;
pub use ports::outbound::{LogStore, SnapshotStore};
