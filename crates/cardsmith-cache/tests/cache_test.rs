//! Behaviour tests for the result cache.

use std::sync::Arc;
use std::time::Duration;

use cardsmith_cache::{CacheError, HealthStatus, ResultCache, TtlPolicy, spawn_sweeper};
use cardsmith_clock::ManualClock;
use chrono::TimeDelta;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn test_cache() -> (Arc<ResultCache>, ManualClock) {
  let clock = ManualClock::starting_now();
  let cache = Arc::new(ResultCache::new(TtlPolicy::default(), Arc::new(clock.clone())));
  (cache, clock)
}

#[test]
fn test_trend_analysis_ttl_window() {
  let (cache, clock) = test_cache();
  let input = json!({"limit": 20, "timeRange": "7d"});
  let value = json!({"trends": ["rust", "wasm"]});

  cache.put("trend-analysis", &input, value.clone()).unwrap();

  clock.advance(TimeDelta::minutes(10));
  assert_eq!(cache.get("trend-analysis", &input).unwrap(), Some(value));

  clock.advance(TimeDelta::minutes(21));
  assert_eq!(cache.get("trend-analysis", &input).unwrap(), None);
}

#[test]
fn test_expiry_is_exact_at_boundary() {
  let (cache, clock) = test_cache();
  let input = json!({"q": "x"});
  cache.put("content-search", &input, json!(true)).unwrap();

  clock.advance(TimeDelta::minutes(5) - TimeDelta::milliseconds(1));
  assert!(cache.get("content-search", &input).unwrap().is_some());

  clock.advance(TimeDelta::milliseconds(1));
  assert!(cache.get("content-search", &input).unwrap().is_none());
  // Still physically present until swept.
  assert_eq!(cache.len(), 1);
}

#[test]
fn test_lookup_ignores_key_order() {
  let (cache, _clock) = test_cache();

  cache
    .put(
      "content-recommendation",
      &json!({"userId": "u1", "filters": {"tag": "rust", "lang": "en"}}),
      json!(["card-1"]),
    )
    .unwrap();

  let hit = cache
    .get(
      "content-recommendation",
      &json!({"filters": {"lang": "en", "tag": "rust"}, "userId": "u1"}),
    )
    .unwrap();
  assert_eq!(hit, Some(json!(["card-1"])));
}

#[test]
fn test_clear_workflow_leaves_other_workflows() {
  let (cache, _clock) = test_cache();
  cache.put("content-search", &json!({"q": "a"}), json!(1)).unwrap();
  cache.put("content-search", &json!({"q": "b"}), json!(2)).unwrap();
  cache
    .put("content-recommendation", &json!({"q": "a"}), json!(3))
    .unwrap();

  assert_eq!(cache.clear_workflow("content-search"), 2);

  assert_eq!(cache.get("content-search", &json!({"q": "a"})).unwrap(), None);
  assert_eq!(
    cache
      .get("content-recommendation", &json!({"q": "a"}))
      .unwrap(),
    Some(json!(3))
  );
  assert_eq!(cache.clear_workflow("content-search"), 0);
}

#[test]
fn test_clear_user_uses_input_user_id() {
  let (cache, _clock) = test_cache();
  cache
    .put("user-achievement", &json!({"userId": "u1"}), json!("a"))
    .unwrap();
  cache
    .put("user-analytics", &json!({"user_id": "u1", "range": "30d"}), json!("b"))
    .unwrap();
  cache
    .put("user-analytics", &json!({"userId": "u2"}), json!("c"))
    .unwrap();
  cache
    .put("content-search", &json!({"q": "u1"}), json!("d"))
    .unwrap();

  assert_eq!(cache.clear_user("u1"), 2);

  assert_eq!(cache.len(), 2);
  assert_eq!(
    cache.get("user-analytics", &json!({"userId": "u2"})).unwrap(),
    Some(json!("c"))
  );
  assert_eq!(
    cache.get("content-search", &json!({"q": "u1"})).unwrap(),
    Some(json!("d"))
  );
}

#[test]
fn test_clear_all() {
  let (cache, _clock) = test_cache();
  cache.put("a", &json!({}), json!(1)).unwrap();
  cache.put("b", &json!({}), json!(2)).unwrap();

  assert_eq!(cache.clear(), 2);
  assert!(cache.is_empty());
  assert_eq!(cache.stats().total_entries, 0);
}

#[test]
fn test_stats_and_health_track_lazy_expiry() {
  let (cache, clock) = test_cache();
  cache.put("content-search", &json!({"q": 1}), json!(1)).unwrap();
  cache.put("content-search", &json!({"q": 2}), json!(2)).unwrap();
  cache.put("user-analytics", &json!({"q": 3}), json!(3)).unwrap();

  assert_eq!(cache.health_check().status, HealthStatus::Healthy);

  clock.advance(TimeDelta::minutes(6));

  let stats = cache.stats();
  assert_eq!(stats.total_entries, 3);
  assert_eq!(stats.expired_entries, 2);

  let health = cache.health_check();
  assert_eq!(health.status, HealthStatus::Degraded);
  assert_eq!(health.total_entries, 3);

  assert_eq!(cache.sweep(), 2);
  assert_eq!(cache.stats().expired_entries, 0);
  assert_eq!(cache.health_check().status, HealthStatus::Healthy);
}

#[test]
fn test_empty_cache_is_healthy() {
  let (cache, _clock) = test_cache();
  let health = cache.health_check();
  assert_eq!(health.status, HealthStatus::Healthy);
  assert_eq!(health.expired_ratio, 0.0);
}

#[test]
fn test_unserializable_input_is_an_error_not_a_miss() {
  let (cache, _clock) = test_cache();
  let mut input = std::collections::HashMap::new();
  input.insert(vec![1u8], 1);

  assert!(matches!(
    cache.get("content-search", &input),
    Err(CacheError::KeySerialization { .. })
  ));
  assert!(cache.put("content-search", &input, json!(1)).is_err());
  assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_removes_expired_entries() {
  let (cache, clock) = test_cache();
  cache.put("content-search", &json!({"q": 1}), json!(1)).unwrap();
  cache.put("user-analytics", &json!({"q": 2}), json!(2)).unwrap();
  clock.advance(TimeDelta::minutes(6));

  let cancel = CancellationToken::new();
  let handle = spawn_sweeper(cache.clone(), Duration::from_secs(300), cancel.clone());

  tokio::time::sleep(Duration::from_secs(299)).await;
  assert_eq!(cache.len(), 2);

  tokio::time::sleep(Duration::from_secs(2)).await;
  assert_eq!(cache.len(), 1);

  cancel.cancel();
  handle.await.unwrap();
}
