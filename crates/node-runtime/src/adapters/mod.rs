//! # Adapter Implementations
//!
//! Concrete implementations of the subsystems' outbound ports, plus the two
//! peer transports.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 OUTER LAYER (Adapters)                       │
//! │  NodeRegistryView, PeerSource, EngineSubmitter, transports   │
//! │                        ↑ implements ↑                        │
//! │                 MIDDLE LAYER (Ports)                         │
//! │  RegistryView, SyncSource, ProposalSubmitter, PeerRpc        │
//! │                          ↑ uses ↑                            │
//! │                 INNER LAYER (Domain)                         │
//! │  log, registry state, ballots, batches                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod http_transport;
pub mod local_network;
pub mod node_ports;
