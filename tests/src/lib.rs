//! # Web Registry Test Suite
//!
//! In-process clusters of real nodes talking over a [`LocalNetwork`]
//! broker.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── cluster.rs        # TestCluster harness
//! └── integration/
//!     ├── scenarios.rs  # three-node deploys, late joiner
//!     ├── properties.rs # agreement, replay, uniqueness
//!     ├── faults.rs     # partition, restart, halt
//!     └── client_rpc.rs # JSON-RPC over the client router
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p wr-tests
//! cargo test -p wr-tests integration::faults::
//! ```
//!
//! [`LocalNetwork`]: node_runtime::LocalNetwork

pub mod cluster;
pub mod integration;

pub use cluster::TestCluster;
