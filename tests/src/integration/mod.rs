//! Cross-node scenarios.

mod client_rpc;
mod faults;
mod properties;
mod scenarios;
