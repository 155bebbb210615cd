//! Domain layer for the consensus engine.
//!
//! - config: round timing and retry policy
//! - ledger: per-index promises and accepted proposals held by a voter
//! - tally: promise and vote counting for one round
//! - backoff: retry delays

mod backoff;
mod config;
mod error;
mod ledger;
mod tally;

pub use backoff::*;
pub use config::*;
pub use error::*;
pub use ledger::*;
pub use tally::*;
