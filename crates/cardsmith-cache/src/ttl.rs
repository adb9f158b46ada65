//! Per-workflow time-to-live policy.

use std::collections::HashMap;
use std::time::Duration;

use cardsmith_config::CacheConfig;
use chrono::TimeDelta;

/// Maps workflow ids to how long their results stay fresh.
#[derive(Debug, Clone, PartialEq)]
pub struct TtlPolicy {
  default_ttl: Duration,
  overrides: HashMap<String, Duration>,
}

impl TtlPolicy {
  pub fn new(default_ttl: Duration) -> Self {
    Self {
      default_ttl,
      overrides: HashMap::new(),
    }
  }

  pub fn from_config(config: &CacheConfig) -> Self {
    let overrides = config
      .ttl_secs
      .iter()
      .map(|(id, secs)| (id.clone(), Duration::from_secs(*secs)))
      .collect();
    Self {
      default_ttl: config.default_ttl(),
      overrides,
    }
  }

  /// Set the TTL for one workflow.
  pub fn with_ttl(mut self, workflow_id: impl Into<String>, ttl: Duration) -> Self {
    self.overrides.insert(workflow_id.into(), ttl);
    self
  }

  pub fn ttl_for(&self, workflow_id: &str) -> Duration {
    self
      .overrides
      .get(workflow_id)
      .copied()
      .unwrap_or(self.default_ttl)
  }

  /// TTL as a chrono delta, saturating for durations chrono cannot represent.
  pub(crate) fn delta_for(&self, workflow_id: &str) -> TimeDelta {
    TimeDelta::from_std(self.ttl_for(workflow_id)).unwrap_or(TimeDelta::MAX)
  }
}

impl Default for TtlPolicy {
  fn default() -> Self {
    Self::from_config(&CacheConfig::default())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_policy_matches_config_table() {
    let policy = TtlPolicy::default();
    assert_eq!(policy.ttl_for("content-recommendation"), Duration::from_secs(10 * 60));
    assert_eq!(policy.ttl_for("content-search"), Duration::from_secs(5 * 60));
    assert_eq!(policy.ttl_for("user-achievement"), Duration::from_secs(30 * 60));
    assert_eq!(policy.ttl_for("user-analytics"), Duration::from_secs(60 * 60));
    assert_eq!(policy.ttl_for("user-engagement"), Duration::from_secs(15 * 60));
    assert_eq!(policy.ttl_for("trend-analysis"), Duration::from_secs(30 * 60));
    assert_eq!(policy.ttl_for("card-generation"), Duration::from_secs(15 * 60));
    assert_eq!(policy.ttl_for("anything-else"), Duration::from_secs(15 * 60));
  }

  #[test]
  fn test_from_config_replaced_table_falls_back_to_default() {
    let mut config = CacheConfig::default();
    config.default_ttl_secs = 60;
    config.ttl_secs = HashMap::from([("custom".to_string(), 5)]);

    let policy = TtlPolicy::from_config(&config);

    assert_eq!(policy.ttl_for("custom"), Duration::from_secs(5));
    assert_eq!(policy.ttl_for("unknown"), Duration::from_secs(60));
    assert_eq!(policy.ttl_for("trend-analysis"), Duration::from_secs(60));
  }

  #[test]
  fn test_override() {
    let policy = TtlPolicy::new(Duration::from_secs(1)).with_ttl("slow", Duration::from_secs(99));
    assert_eq!(policy.ttl_for("slow"), Duration::from_secs(99));
    assert_eq!(policy.ttl_for("fast"), Duration::from_secs(1));
  }

  #[test]
  fn test_huge_ttl_saturates() {
    let policy = TtlPolicy::new(Duration::from_secs(u64::MAX));
    assert_eq!(policy.delta_for("w"), TimeDelta::MAX);
  }
}
