//! # Handlers
//!
//! The commit pipeline every write goes through, and the background loops
//! that keep the node in step with its peers.

pub mod commit_pipeline;
pub mod sync_driver;

pub use commit_pipeline::{CommitPipeline, PipelineError, PipelineSettings};
