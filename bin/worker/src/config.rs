//! Worker configuration.
//!
//! Loaded via the `config` crate from an optional `relaydesk.toml` and
//! then from environment variables, which win. Environment keys use the
//! `RELAYDESK_` prefix and `__` between levels, e.g.
//! `RELAYDESK_ENGINE__MAX_STEPS=50`.

use relaydesk_automation::EngineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file read from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "relaydesk.toml";

/// Worker configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// JSON file with tenants, contacts and workflow definitions.
    #[serde(default)]
    pub fixtures_path: Option<PathBuf>,

    /// Execution engine limits.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Base URL of the messaging provider API. Messages are only logged
    /// when unset.
    #[serde(default)]
    pub provider_base_url: Option<String>,

    /// Timeout for provider and webhook HTTP calls, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_http_timeout_secs() -> u64 {
    10
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            fixtures_path: None,
            engine: EngineConfig::default(),
            provider_base_url: None,
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl WorkerConfig {
    /// Loads configuration from [`DEFAULT_CONFIG_FILE`] and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source is malformed or a value has the wrong type.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Loads configuration from the given file, if it exists, and the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source is malformed or a value has the wrong type.
    pub fn load_from(file: &Path) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from(file).required(false))
            .add_source(
                config::Environment::with_prefix("RELAYDESK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
