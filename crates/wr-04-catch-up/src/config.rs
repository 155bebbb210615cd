//! # Catch-Up Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Catch-up tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatchUpConfig {
    /// Entries requested per fetch. Keep above the steady-state commit rate
    /// per step so the gap shrinks.
    pub batch_size: u64,

    /// Floor for the halved batch size after failures.
    pub min_batch_size: u64,

    /// Idle period between health probes while caught up.
    pub interval_ms: u64,

    /// Pause after a failed step.
    pub retry_delay_ms: u64,

    /// Steps `run_until_caught_up` may take.
    pub max_sync_rounds: u32,

    /// Per-peer health probe timeout.
    pub health_timeout_ms: u64,

    /// Per-batch fetch timeout.
    pub fetch_timeout_ms: u64,

    /// Steps a failing peer is skipped for.
    pub penalty_steps: u64,
}

impl Default for CatchUpConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            min_batch_size: 1,
            interval_ms: 250,
            retry_delay_ms: 50,
            max_sync_rounds: 128,
            health_timeout_ms: 500,
            fetch_timeout_ms: 2_000,
            penalty_steps: 4,
        }
    }
}

impl CatchUpConfig {
    /// Small batches and short timeouts for in-process clusters.
    pub fn for_testing() -> Self {
        Self {
            batch_size: 16,
            min_batch_size: 1,
            interval_ms: 20,
            retry_delay_ms: 5,
            max_sync_rounds: 64,
            health_timeout_ms: 100,
            fetch_timeout_ms: 500,
            penalty_steps: 2,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
