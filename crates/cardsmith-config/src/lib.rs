//! Cardsmith Config
//!
//! Serializable settings for the cache, the execution engine, and the polling
//! contract between them. Every field has a default, so a configuration file
//! only needs to name what it overrides:
//!
//! ```json
//! {
//!   "cache": { "ttl_secs": { "trend-analysis": 600 } },
//!   "polling": { "timeout_secs": 30 }
//! }
//! ```

mod cache;
mod engine;
mod error;
mod polling;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use cache::CacheConfig;
pub use engine::EngineConfig;
pub use error::ConfigError;
pub use polling::PollingConfig;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub cache: CacheConfig,
  pub engine: EngineConfig,
  pub polling: PollingConfig,
}

impl Config {
  /// Load and validate a configuration file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let config: Config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    config.validate()?;
    Ok(config)
  }

  /// Load `path` if it exists, otherwise fall back to the defaults.
  pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    if path.exists() {
      Self::load(path)
    } else {
      Ok(Self::default())
    }
  }

  /// Check cross-field constraints that serde cannot express.
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.cache.validate()?;
    self.polling.validate()?;
    Ok(())
  }
}
