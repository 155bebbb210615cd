//! # Shared Crypto - Registry Identities and Digests
//!
//! Every actor in the registry is named by an Ed25519 public key: peers sign
//! votes with their node key, deployers sign deploy and remove intents with
//! theirs. BLAKE3 provides content-independent digests of log entries and
//! registry state.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | BLAKE3 | Entry digests, state roots, genesis hash |
//! | `signatures` | Ed25519 | Vote signatures, deploy intents |
//!
//! ## Domain Separation
//!
//! Signed payloads are always prefixed with a context string
//! (see [`signatures::KeyPair::sign_in_context`]) so a vote signature can
//! never be replayed as a deploy authorization and vice versa.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod signatures;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{blake3_hash, blake3_hash_many, context_hash, Blake3Hasher, Hash};
pub use signatures::{KeyPair, PublicKey, Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
