//! Management surfaces for administrative and orchestration routes.
//!
//! Every operation returns a serializable report so a route can hand it back
//! as-is.

use std::sync::Arc;
use std::time::Duration;

use cardsmith_cache::{CacheHealth, CacheStats, ResultCache};
use cardsmith_config::EngineConfig;
use cardsmith_engine::{WorkflowEngine, WorkflowRun};
use cardsmith_workflow::TemplateSummary;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::OrchestratorError;
use crate::executor::{CachedExecutor, WarmupReport, WarmupRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheOverview {
  pub stats: CacheStats,
  pub health: CacheHealth,
}

/// Which entries a clear removes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum ClearScope {
  All,
  Workflow { workflow_id: String },
  User { user_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearReport {
  pub scope: ClearScope,
  pub removed: usize,
}

/// Entry or run counts around a cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
  pub before: usize,
  pub after: usize,
  pub removed: usize,
}

impl CleanupReport {
  fn new(before: usize, after: usize) -> Self {
    Self {
      before,
      after,
      removed: before.saturating_sub(after),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopReport {
  pub run_id: String,
  pub stopped: bool,
}

/// Cache management: statistics, invalidation, warmup, and sweeping.
#[derive(Clone)]
pub struct CacheAdmin {
  cache: Arc<ResultCache>,
  executor: Arc<CachedExecutor>,
}

impl CacheAdmin {
  pub fn new(executor: Arc<CachedExecutor>) -> Self {
    Self {
      cache: executor.cache().clone(),
      executor,
    }
  }

  pub fn overview(&self) -> CacheOverview {
    CacheOverview {
      stats: self.cache.stats(),
      health: self.cache.health_check(),
    }
  }

  pub fn clear(&self, scope: ClearScope) -> ClearReport {
    let removed = match &scope {
      ClearScope::All => self.cache.clear(),
      ClearScope::Workflow { workflow_id } => self.cache.clear_workflow(workflow_id),
      ClearScope::User { user_id } => self.cache.clear_user(user_id),
    };
    ClearReport { scope, removed }
  }

  pub async fn warmup(&self, requests: Vec<WarmupRequest>) -> WarmupReport {
    self.executor.warmup(requests).await
  }

  /// Run a sweep now and report entry counts around it.
  pub fn cleanup(&self) -> CleanupReport {
    let before = self.cache.len();
    self.cache.sweep();
    let report = CleanupReport::new(before, self.cache.len());
    info!(before = report.before, after = report.after, "cache_cleanup");
    report
  }
}

/// Workflow management: templates and run control.
#[derive(Clone)]
pub struct WorkflowAdmin {
  engine: Arc<WorkflowEngine>,
  retention: Duration,
}

impl WorkflowAdmin {
  /// Admin with the default run retention.
  pub fn new(engine: Arc<WorkflowEngine>) -> Self {
    Self {
      engine,
      retention: EngineConfig::default().run_retention(),
    }
  }

  /// Age after which [`cleanup_expired`](Self::cleanup_expired) removes
  /// finished runs.
  pub fn with_retention(mut self, retention: Duration) -> Self {
    self.retention = retention;
    self
  }

  pub fn retention(&self) -> Duration {
    self.retention
  }

  pub fn templates(&self) -> Vec<TemplateSummary> {
    self.engine.list_templates()
  }

  /// # Errors
  /// [`OrchestratorError::RunNotFound`] if the run is unknown or was cleaned up.
  pub fn status(&self, run_id: &str) -> Result<WorkflowRun, OrchestratorError> {
    self
      .engine
      .get_status(run_id)
      .ok_or_else(|| OrchestratorError::RunNotFound {
        run_id: run_id.to_string(),
      })
  }

  pub fn stop(&self, run_id: &str) -> StopReport {
    StopReport {
      run_id: run_id.to_string(),
      stopped: self.engine.cancel(run_id),
    }
  }

  /// Remove finished runs older than `age`.
  pub fn cleanup(&self, age: Duration) -> CleanupReport {
    let before = self.engine.run_count();
    self.engine.cleanup_older_than(age);
    let report = CleanupReport::new(before, self.engine.run_count());
    info!(before = report.before, after = report.after, "runs_cleanup");
    report
  }

  /// Remove finished runs older than the configured retention.
  pub fn cleanup_expired(&self) -> CleanupReport {
    self.cleanup(self.retention)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_clear_scope_serialization() {
    let scope: ClearScope =
      serde_json::from_str(r#"{"scope":"workflow","workflow_id":"content-search"}"#).unwrap();
    assert_eq!(
      scope,
      ClearScope::Workflow {
        workflow_id: "content-search".to_string()
      }
    );

    let all: ClearScope = serde_json::from_str(r#"{"scope":"all"}"#).unwrap();
    assert_eq!(all, ClearScope::All);
  }

  #[test]
  fn test_cleanup_report_counts() {
    let report = CleanupReport::new(5, 2);
    assert_eq!(report.removed, 3);
  }
}
