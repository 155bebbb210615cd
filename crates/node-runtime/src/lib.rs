//! # Node Runtime Library
//!
//! Wires the registry subsystems into a running node. The `wr-node` binary
//! in `main.rs` is a thin shell around [`RegistryNode`].
//!
//! ## Modules
//!
//! - `config` - [`NodeConfig`]: TOML file plus `WR_*` environment overrides
//! - `handlers` - the commit pipeline (single writer) and background drivers
//! - `adapters` - port implementations and peer transports
//! - `node` - construction, start and stop of one node
//!
//! ## Startup Sequence
//!
//! 1. Load and validate configuration
//! 2. Open the commit pipeline (log reload, snapshot restore, replay)
//! 3. Build catch-up, consensus and the client service on top of it
//! 4. Start the proposal driver, catch-up loop, halt watcher and heartbeat
//! 5. Serve peer and client HTTP

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod node;

pub use adapters::http_transport::{peer_router, HttpDirectory, HttpPeerClient};
pub use adapters::local_network::{LocalDirectory, LocalNetwork};
pub use config::{ConfigError, GenesisPeer, NodeConfig};
pub use handlers::commit_pipeline::{CommitPipeline, PipelineError, PipelineSettings};
pub use node::{RegistryNode, Transport};
