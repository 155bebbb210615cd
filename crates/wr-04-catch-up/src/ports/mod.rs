//! Ports for catch-up.

pub mod outbound;

pub use outbound::*;
