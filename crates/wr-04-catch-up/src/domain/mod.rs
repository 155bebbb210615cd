//! Domain layer for catch-up.

mod batch;
mod errors;
mod peers;

pub use batch::*;
pub use errors::*;
pub use peers::*;
