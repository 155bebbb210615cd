//! # Client Interface (Subsystem 5)
//!
//! The surface deployers talk to. Writes become proposals; reads are served
//! from the local registry state without a quorum round.
//!
//! ## Operations
//!
//! | Call | Path | Notes |
//! |------|------|-------|
//! | `deploy` | proposal | signs with the deployer key, then `deploy_signed` |
//! | `deploy_signed` | proposal | waits until the local state shows the commit |
//! | `remove` | proposal | tombstones the name |
//! | `get` | local read | answer carries `as_of_height` and `sync_state` |
//! | `list` | local read | optional owner filter |
//! | `info` | local read | height, root, sync state, config version |
//!
//! ## JSON-RPC
//!
//! [`build_router`] exposes the operations as `registry_*` methods over
//! HTTP POST with JSON-RPC 2.0 framing.
//!
//! ```text
//! client ──JSON──▶ rpc::route_method ──▶ ClientService ──▶ ProposalSubmitter
//!                                            │
//!                                            └──▶ RegistryQueries (local)
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod rpc;
pub mod service;

#[cfg(test)]
mod testing;

pub use adapters::{AcceptAllBundleStore, TemplateLocator};
pub use domain::*;
pub use ports::{BundleStore, LocatorDeriver, NodeStatus, ProposalSubmitter, SubmitError};
pub use rpc::build_router;
pub use service::{ClientPorts, ClientService};
