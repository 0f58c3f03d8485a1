//! Engine limits and policies.

use serde::Deserialize;
use std::time::Duration;

/// Configuration for the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Maximum node invocations per run. Bounds runs over cyclic graphs.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Per-node handler timeout, in seconds.
    #[serde(default = "default_node_timeout_secs")]
    pub node_timeout_secs: u64,

    /// Wall-clock budget of a run, in seconds. Checked between nodes.
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,

    /// Whether a non-2xx webhook answer fails the node when the node
    /// itself does not say.
    #[serde(default)]
    pub fail_webhook_on_error_status: bool,
}

fn default_max_steps() -> usize {
    100
}

fn default_node_timeout_secs() -> u64 {
    30
}

fn default_run_timeout_secs() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            node_timeout_secs: default_node_timeout_secs(),
            run_timeout_secs: default_run_timeout_secs(),
            fail_webhook_on_error_status: false,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn node_timeout(&self) -> Duration {
        Duration::from_secs(self.node_timeout_secs)
    }

    #[must_use]
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_has_correct_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_steps, 100);
        assert_eq!(config.node_timeout(), Duration::from_secs(30));
        assert_eq!(config.run_timeout(), Duration::from_secs(300));
        assert!(!config.fail_webhook_on_error_status);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "max_steps": 5 }"#).expect("deserialize");
        assert_eq!(config.max_steps, 5);
        assert_eq!(config.node_timeout_secs, 30);
    }
}
