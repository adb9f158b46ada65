//! Polling contract settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How callers poll a run for completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
  /// Delay between status checks.
  pub interval_ms: u64,
  /// Wall-clock budget before the run is cancelled and reported as timed out.
  pub timeout_secs: u64,
}

impl Default for PollingConfig {
  fn default() -> Self {
    Self {
      interval_ms: 250,
      timeout_secs: 120,
    }
  }
}

impl PollingConfig {
  pub fn interval(&self) -> Duration {
    Duration::from_millis(self.interval_ms)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  pub(crate) fn validate(&self) -> Result<(), ConfigError> {
    if self.interval_ms == 0 {
      return Err(ConfigError::invalid("polling.interval_ms must be positive"));
    }
    if self.timeout() < self.interval() {
      return Err(ConfigError::invalid(format!(
        "polling.timeout_secs ({}s) is shorter than polling.interval_ms ({}ms)",
        self.timeout_secs, self.interval_ms
      )));
    }
    Ok(())
  }
}
