//! Domain layer: the log itself and its supporting value types.

pub mod buffer;
pub mod errors;
pub mod log;
pub mod record;
pub mod snapshot;
