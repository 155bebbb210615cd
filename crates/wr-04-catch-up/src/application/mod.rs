//! Application layer.

mod service;

pub use service::{CatchUpManager, StepOutcome};
