//! Registry state, validation rules and snapshot images.

pub mod errors;
pub mod registry;
pub mod snapshot;
pub mod validation;
