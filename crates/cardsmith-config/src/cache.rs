//! Cache settings.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Time-to-live and sweep settings for the result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// TTL for workflows missing from `ttl_secs`.
  pub default_ttl_secs: u64,
  /// Per-workflow TTL table, keyed by workflow id.
  pub ttl_secs: HashMap<String, u64>,
  /// How often the background sweep removes expired entries.
  pub sweep_interval_secs: u64,
  /// Expired/total ratio above which the cache reports itself degraded.
  pub degraded_expired_ratio: f64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    let ttl_secs = [
      ("content-recommendation", 10 * 60),
      ("content-search", 5 * 60),
      ("user-achievement", 30 * 60),
      ("user-analytics", 60 * 60),
      ("user-engagement", 15 * 60),
      ("trend-analysis", 30 * 60),
    ]
    .into_iter()
    .map(|(id, secs)| (id.to_string(), secs))
    .collect();

    Self {
      default_ttl_secs: 15 * 60,
      ttl_secs,
      sweep_interval_secs: 5 * 60,
      degraded_expired_ratio: 0.5,
    }
  }
}

impl CacheConfig {
  pub fn default_ttl(&self) -> Duration {
    Duration::from_secs(self.default_ttl_secs)
  }

  pub fn sweep_interval(&self) -> Duration {
    Duration::from_secs(self.sweep_interval_secs)
  }

  pub(crate) fn validate(&self) -> Result<(), ConfigError> {
    if self.sweep_interval_secs == 0 {
      return Err(ConfigError::invalid("cache.sweep_interval_secs must be positive"));
    }
    if !(self.degraded_expired_ratio > 0.0 && self.degraded_expired_ratio <= 1.0) {
      return Err(ConfigError::invalid(format!(
        "cache.degraded_expired_ratio must be in (0, 1], got {}",
        self.degraded_expired_ratio
      )));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_ttl_table() {
    let config = CacheConfig::default();
    assert_eq!(config.ttl_secs.len(), 6);
    assert_eq!(config.ttl_secs["content-recommendation"], 600);
    assert_eq!(config.ttl_secs["content-search"], 300);
    assert_eq!(config.ttl_secs["user-achievement"], 1800);
    assert_eq!(config.ttl_secs["user-analytics"], 3600);
    assert_eq!(config.ttl_secs["user-engagement"], 900);
    assert_eq!(config.ttl_secs["trend-analysis"], 1800);
    assert!(!config.ttl_secs.contains_key("card-generation"));
    assert_eq!(config.default_ttl(), Duration::from_secs(900));
  }

  #[test]
  fn test_ratio_bounds() {
    let mut config = CacheConfig::default();
    config.degraded_expired_ratio = 0.0;
    assert!(config.validate().is_err());
    config.degraded_expired_ratio = 1.5;
    assert!(config.validate().is_err());
    config.degraded_expired_ratio = 1.0;
    assert!(config.validate().is_ok());
  }
}
