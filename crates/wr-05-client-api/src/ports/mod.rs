//! Ports of the client interface.
//!
//! Reads go through `wr_02_state_store::RegistryQueries`; everything else
//! the service needs from the node is declared in [`outbound`].

pub mod outbound;

pub use outbound::*;
