//! # Client Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client interface settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Upper bound on a deploy or remove call, from submission until the
    /// local state reflects the commit.
    pub deploy_timeout_ms: u64,

    /// Locator template; `{name}` and `{owner}` are substituted.
    pub locator_template: String,

    /// Largest accepted JSON-RPC body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            deploy_timeout_ms: 30_000,
            locator_template: "https://{name}.registry.local/".to_string(),
            max_body_bytes: 256 * 1024,
        }
    }
}

impl ClientConfig {
    /// Short timeouts for tests.
    pub fn for_testing() -> Self {
        Self {
            deploy_timeout_ms: 2_000,
            ..Self::default()
        }
    }

    pub fn deploy_timeout(&self) -> Duration {
        Duration::from_millis(self.deploy_timeout_ms)
    }

    /// Check the template mentions the name.
    pub fn validate(&self) -> Result<(), String> {
        if !self.locator_template.contains("{name}") {
            return Err("locator_template must contain {name}".into());
        }
        if self.deploy_timeout_ms == 0 {
            return Err("deploy_timeout_ms must be positive".into());
        }
        Ok(())
    }
}
