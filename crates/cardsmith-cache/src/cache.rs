//! The result cache.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use cardsmith_clock::SharedClock;
use cardsmith_config::CacheConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::key::CacheKey;
use crate::ttl::TtlPolicy;

const DEFAULT_DEGRADED_RATIO: f64 = 0.5;

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
  pub total_entries: usize,
  pub total_size_bytes: usize,
  /// Entries past their expiry that the sweep has not removed yet.
  pub expired_entries: usize,
  pub hits: u64,
  pub misses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
  Healthy,
  Degraded,
}

/// Result of [`ResultCache::health_check`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheHealth {
  pub status: HealthStatus,
  pub total_entries: usize,
  pub expired_ratio: f64,
}

/// Entries plus the secondary indexes used for bulk invalidation.
#[derive(Debug, Default)]
struct CacheState {
  entries: HashMap<String, CacheEntry>,
  by_workflow: HashMap<String, HashSet<String>>,
  by_user: HashMap<String, HashSet<String>>,
}

impl CacheState {
  fn insert(&mut self, entry: CacheEntry) {
    self
      .by_workflow
      .entry(entry.workflow_id.clone())
      .or_default()
      .insert(entry.key.clone());
    if let Some(user_id) = &entry.user_id {
      self
        .by_user
        .entry(user_id.clone())
        .or_default()
        .insert(entry.key.clone());
    }
    self.entries.insert(entry.key.clone(), entry);
  }

  /// Remove one entry and unlink it from both indexes.
  fn remove(&mut self, key: &str) -> bool {
    let Some(entry) = self.entries.remove(key) else {
      return false;
    };
    unlink(&mut self.by_workflow, &entry.workflow_id, key);
    if let Some(user_id) = &entry.user_id {
      unlink(&mut self.by_user, user_id, key);
    }
    true
  }

  fn remove_all(&mut self, keys: impl IntoIterator<Item = String>) -> usize {
    keys.into_iter().filter(|key| self.remove(key)).count()
  }
}

fn unlink(index: &mut HashMap<String, HashSet<String>>, owner: &str, key: &str) {
  if let Some(keys) = index.get_mut(owner) {
    keys.remove(key);
    if keys.is_empty() {
      index.remove(owner);
    }
  }
}

/// In-memory TTL cache of workflow results.
///
/// All mutation happens inside a single lock acquisition, so concurrent
/// readers never see an entry without its index links or vice versa.
pub struct ResultCache {
  state: RwLock<CacheState>,
  policy: TtlPolicy,
  clock: SharedClock,
  degraded_ratio: f64,
  hits: AtomicU64,
  misses: AtomicU64,
}

impl ResultCache {
  pub fn new(policy: TtlPolicy, clock: SharedClock) -> Self {
    Self {
      state: RwLock::new(CacheState::default()),
      policy,
      clock,
      degraded_ratio: DEFAULT_DEGRADED_RATIO,
      hits: AtomicU64::new(0),
      misses: AtomicU64::new(0),
    }
  }

  pub fn from_config(config: &CacheConfig, clock: SharedClock) -> Self {
    Self::new(TtlPolicy::from_config(config), clock)
      .with_degraded_ratio(config.degraded_expired_ratio)
  }

  /// Expired/total ratio above which [`health_check`](Self::health_check)
  /// reports [`HealthStatus::Degraded`].
  pub fn with_degraded_ratio(mut self, ratio: f64) -> Self {
    self.degraded_ratio = ratio;
    self
  }

  pub fn policy(&self) -> &TtlPolicy {
    &self.policy
  }

  /// Look up a fresh result for `input` under `workflow_id`.
  pub fn get<T>(&self, workflow_id: &str, input: &T) -> Result<Option<Value>, CacheError>
  where
    T: Serialize + ?Sized,
  {
    let key = CacheKey::derive(workflow_id, input)?;
    Ok(self.get_by_key(&key))
  }

  /// Look up a fresh result by a key derived earlier.
  pub fn get_by_key(&self, key: &CacheKey) -> Option<Value> {
    let now = self.clock.now();
    let key_str = key.to_string();
    let value = self
      .read()
      .entries
      .get(&key_str)
      .filter(|entry| !entry.is_expired(now))
      .map(|entry| entry.value.clone());

    if value.is_some() {
      self.hits.fetch_add(1, Ordering::Relaxed);
      debug!(cache_key = %key_str, "cache_hit");
    } else {
      self.misses.fetch_add(1, Ordering::Relaxed);
      debug!(cache_key = %key_str, "cache_miss");
    }
    value
  }

  /// Store `value` for `input` under `workflow_id`, replacing any previous
  /// entry and restarting its TTL.
  pub fn put<T>(&self, workflow_id: &str, input: &T, value: Value) -> Result<CacheKey, CacheError>
  where
    T: Serialize + ?Sized,
  {
    let key = CacheKey::derive(workflow_id, input)?;
    self.insert(&key, value);
    Ok(key)
  }

  /// Store `value` under a key derived earlier.
  pub fn insert(&self, key: &CacheKey, value: Value) {
    let created_at = self.clock.now();
    let expires_at = created_at
      .checked_add_signed(self.policy.delta_for(key.workflow_id()))
      .unwrap_or(DateTime::<Utc>::MAX_UTC);

    let entry = CacheEntry {
      key: key.to_string(),
      workflow_id: key.workflow_id().to_string(),
      user_id: key.user_id().map(str::to_string),
      size_bytes: value.to_string().len(),
      value,
      created_at,
      expires_at,
    };

    debug!(
      cache_key = %entry.key,
      expires_at = %entry.expires_at,
      size_bytes = entry.size_bytes,
      "cache_put"
    );
    self.write().insert(entry);
  }

  /// Remove every entry derived from `workflow_id`, expired or not.
  pub fn clear_workflow(&self, workflow_id: &str) -> usize {
    let mut state = self.write();
    let keys = state.by_workflow.remove(workflow_id).unwrap_or_default();
    let removed = state.remove_all(keys);
    info!(workflow_id = %workflow_id, removed, "cache_cleared_workflow");
    removed
  }

  /// Remove every entry whose input named `user_id`.
  pub fn clear_user(&self, user_id: &str) -> usize {
    let mut state = self.write();
    let keys = state.by_user.remove(user_id).unwrap_or_default();
    let removed = state.remove_all(keys);
    info!(user_id = %user_id, removed, "cache_cleared_user");
    removed
  }

  /// Drop all entries.
  pub fn clear(&self) -> usize {
    let mut state = self.write();
    let removed = state.entries.len();
    *state = CacheState::default();
    info!(removed, "cache_cleared");
    removed
  }

  /// Physically remove expired entries. Returns how many were removed.
  pub fn sweep(&self) -> usize {
    let now = self.clock.now();
    let mut state = self.write();
    let expired: Vec<String> = state
      .entries
      .values()
      .filter(|entry| entry.is_expired(now))
      .map(|entry| entry.key.clone())
      .collect();
    let removed = state.remove_all(expired);
    if removed > 0 {
      info!(removed, remaining = state.entries.len(), "cache_swept");
    }
    removed
  }

  /// Number of physically stored entries, including expired ones.
  pub fn len(&self) -> usize {
    self.read().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn stats(&self) -> CacheStats {
    let now = self.clock.now();
    let state = self.read();
    let (total_size_bytes, expired_entries) =
      state
        .entries
        .values()
        .fold((0, 0), |(size, expired), entry| {
          (
            size + entry.size_bytes,
            expired + usize::from(entry.is_expired(now)),
          )
        });

    CacheStats {
      total_entries: state.entries.len(),
      total_size_bytes,
      expired_entries,
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
    }
  }

  /// Report whether the sweep is keeping up with expiry.
  pub fn health_check(&self) -> CacheHealth {
    let stats = self.stats();
    let expired_ratio = if stats.total_entries == 0 {
      0.0
    } else {
      stats.expired_entries as f64 / stats.total_entries as f64
    };
    let status = if expired_ratio > self.degraded_ratio {
      HealthStatus::Degraded
    } else {
      HealthStatus::Healthy
    };

    CacheHealth {
      status,
      total_entries: stats.total_entries,
      expired_ratio,
    }
  }

  fn read(&self) -> RwLockReadGuard<'_, CacheState> {
    self.state.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
    self.state.write().unwrap_or_else(|e| e.into_inner())
  }
}
