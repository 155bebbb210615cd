//! Client domain: requests, receipts, errors, configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::ClientConfig;
pub use error::{codes, ApiError, ClientError};
pub use types::*;
