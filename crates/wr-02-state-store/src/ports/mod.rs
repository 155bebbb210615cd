//! Port definitions.

pub mod api;
