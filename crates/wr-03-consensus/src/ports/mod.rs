//! Ports for the consensus engine.
//!
//! - inbound: what the node and peers call
//! - outbound: what the engine needs from the node

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
