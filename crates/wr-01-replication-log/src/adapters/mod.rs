//! Store adapters.

pub mod file;
pub mod memory;
