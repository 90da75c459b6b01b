//! PlatformConfig - settings for wiring a [`Platform`](crate::Platform).
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! default_space = "mct"
//! default_namespace = ""
//! queue_delay_ms = 5
//! backend_timeout_ms = 30000
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Space used for identifiers with no reconciled mapping.
    pub default_space: String,
    /// Namespace given to generated identifiers.
    pub default_namespace: String,
    /// How long the persistence queue waits for more writes before draining.
    pub queue_delay_ms: u64,
    /// Per-call backend timeout. `None` waits indefinitely.
    pub backend_timeout_ms: Option<u64>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        PlatformConfig {
            default_space: "mct".to_string(),
            default_namespace: String::new(),
            queue_delay_ms: 5,
            backend_timeout_ms: None,
        }
    }
}

impl PlatformConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: PlatformConfig =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_space.is_empty() {
            return Err(ConfigError::InvalidValue(
                "default_space must not be empty".into(),
            ));
        }
        if self.backend_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue(
                "backend_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn queue_delay(&self) -> Duration {
        Duration::from_millis(self.queue_delay_ms)
    }

    pub fn backend_timeout(&self) -> Option<Duration> {
        self.backend_timeout_ms.map(Duration::from_millis)
    }
}
