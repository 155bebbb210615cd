//! # State Store (wr-02)
//!
//! The registry as a pure fold over the replication log:
//!
//! ```text
//! State(H) = fold(apply, LogEntry[0..H])
//! ```
//!
//! ## Role in System
//!
//! - **Validation oracle**: voters ask [`RegistryState::validate`] before
//!   accepting a proposal at the current height
//! - **Read model**: client reads are served from here without a quorum
//! - **Membership**: the [`shared_types::ClusterConfig`] in force is part of
//!   the state and changes only through committed `Reconfigure` entries
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | Uniqueness | At most one live deployment per name |
//! | 2 | Determinism | Equal height implies byte-identical [`RegistryState::encode`] |
//! | 3 | Monotonic versions | Each mutating commit for a name raises its version |
//! | 4 | Lock-step height | Every committed entry advances the height, even if rejected |

pub mod domain;
pub mod ports;

pub use domain::errors::StateError;
pub use domain::registry::{ApplyOutcome, NameRecord, RegistryState};
pub use domain::snapshot::StateImage;
pub use domain::validation::{validate_operation, validate_proposal};
pub use ports::api::RegistryQueries;
