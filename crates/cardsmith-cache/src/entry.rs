//! Cache entries.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A stored workflow result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
  /// Display form of the [`CacheKey`](crate::CacheKey).
  pub key: String,
  pub workflow_id: String,
  pub user_id: Option<String>,
  pub value: serde_json::Value,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
  /// Length of the serialized value, for reporting.
  pub size_bytes: usize,
}

impl CacheEntry {
  /// Whether the entry is past its expiry at `now`.
  ///
  /// This is the only expiry check; an entry that is expired here is absent
  /// to readers whether or not the sweep has removed it yet.
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    now >= self.expires_at
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeDelta;

  use super::*;

  #[test]
  fn test_expiry_boundary() {
    let created_at = Utc::now();
    let entry = CacheEntry {
      key: "w:abc".to_string(),
      workflow_id: "w".to_string(),
      user_id: None,
      value: serde_json::json!({}),
      created_at,
      expires_at: created_at + TimeDelta::minutes(5),
      size_bytes: 2,
    };

    assert!(!entry.is_expired(created_at));
    assert!(!entry.is_expired(created_at + TimeDelta::minutes(5) - TimeDelta::milliseconds(1)));
    assert!(entry.is_expired(created_at + TimeDelta::minutes(5)));
  }
}
