//! # Shared Types Crate
//!
//! Domain entities, commit certificates and peer RPC payloads shared by the
//! registry subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a crate or a node
//!   boundary is defined here.
//! - **Canonical Bytes**: digests and signatures are computed over the
//!   explicit encoding in [`encoding`], never over a serde format, so every
//!   node derives identical bytes for identical values.
//! - **Quorum from Config**: a [`CommitCertificate`] is only meaningful
//!   relative to the [`ClusterConfig`] in force at its index.

pub mod certificate;
pub mod encoding;
pub mod entities;
pub mod errors;
pub mod rpc;

pub use certificate::*;
pub use entities::*;
pub use errors::*;
pub use rpc::*;

/// Milliseconds since the Unix epoch, saturating to zero on clock skew.
pub fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
