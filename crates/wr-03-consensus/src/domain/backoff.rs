//! Retry delays: `base * 2^attempt`, capped, with jitter in the upper half.

use super::ConsensusConfig;
use rand::Rng;
use std::time::Duration;

/// Delay before retry number `attempt` (0-based).
pub fn backoff_delay(config: &ConsensusConfig, attempt: u32) -> Duration {
    let ceiling = backoff_ceiling(config, attempt);
    let jittered = rand::thread_rng().gen_range(ceiling / 2..=ceiling);
    Duration::from_millis(jittered)
}

fn backoff_ceiling(config: &ConsensusConfig, attempt: u32) -> u64 {
    let base = config.backoff_base_ms.max(1);
    base.saturating_mul(1u64 << attempt.min(32))
        .min(config.backoff_max_ms.max(base))
}
