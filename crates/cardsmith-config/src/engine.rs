//! Engine settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the workflow execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Default age cutoff for cleaning up finished runs.
  pub run_retention_secs: u64,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      run_retention_secs: 24 * 60 * 60,
    }
  }
}

impl EngineConfig {
  pub fn run_retention(&self) -> Duration {
    Duration::from_secs(self.run_retention_secs)
  }
}
