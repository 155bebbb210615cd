//! # State Snapshots
//!
//! A snapshot is an optimization, never an authority: it records the state
//! store's canonical bytes at some height together with their root, and is
//! only used if the root recomputes on restore.

use serde::{Deserialize, Serialize};
use shared_types::Digest;

/// State store bytes at a committed height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Number of entries folded into `payload`.
    pub height: u64,
    /// Root the state store reported when the snapshot was taken.
    pub state_root: Digest,
    /// Opaque state store encoding.
    pub payload: Vec<u8>,
}
