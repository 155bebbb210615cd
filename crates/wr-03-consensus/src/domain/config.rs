//! Consensus configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Round timing and retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// How long one prepare + propose round may take.
    pub round_timeout_ms: u64,
    /// First retry delay.
    pub backoff_base_ms: u64,
    /// Retry delay cap.
    pub backoff_max_ms: u64,
    /// Rounds tried before giving up with `QuorumTimeout`.
    pub max_attempts: u32,
    /// Submissions waiting for the proposal driver.
    pub queue_capacity: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            round_timeout_ms: 1_000,
            backoff_base_ms: 50,
            backoff_max_ms: 2_000,
            max_attempts: 8,
            queue_capacity: 256,
        }
    }
}

impl ConsensusConfig {
    /// Short timeouts for in-process clusters.
    pub fn for_testing() -> Self {
        Self {
            round_timeout_ms: 250,
            backoff_base_ms: 5,
            backoff_max_ms: 40,
            max_attempts: 6,
            queue_capacity: 64,
        }
    }

    /// Round timeout as a `Duration`.
    pub fn round_timeout(&self) -> Duration {
        Duration::from_millis(self.round_timeout_ms)
    }
}
