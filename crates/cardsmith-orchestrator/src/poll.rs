//! The caller side of the polling contract.

use std::time::Duration;

use cardsmith_config::PollingConfig;
use cardsmith_engine::{FailureKind, RunStatus, WorkflowEngine, WorkflowRun};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::OrchestratorError;

/// How often to poll a run, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
  pub interval: Duration,
  pub timeout: Duration,
}

impl PollPolicy {
  pub fn new(interval: Duration, timeout: Duration) -> Self {
    Self { interval, timeout }
  }

  pub fn from_config(config: &PollingConfig) -> Self {
    Self::new(config.interval(), config.timeout())
  }
}

impl Default for PollPolicy {
  fn default() -> Self {
    Self::from_config(&PollingConfig::default())
  }
}

/// Poll `run_id` until it reaches a terminal status or the policy times out.
///
/// On timeout the run is cancelled before returning
/// [`OrchestratorError::Timeout`]. A failed run maps to `StepExecution`, or to
/// `Cancelled` when it was stopped.
pub async fn poll_run(
  engine: &WorkflowEngine,
  run_id: &str,
  policy: PollPolicy,
) -> Result<WorkflowRun, OrchestratorError> {
  let deadline = Instant::now() + policy.timeout;
  let mut ticker = tokio::time::interval(policy.interval);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    ticker.tick().await;

    let run = engine
      .get_status(run_id)
      .ok_or_else(|| OrchestratorError::RunVanished {
        run_id: run_id.to_string(),
      })?;

    match run.status {
      RunStatus::Completed => return Ok(run),
      RunStatus::Failed => return Err(failure_error(&run)),
      RunStatus::Pending | RunStatus::Running => {}
    }

    if Instant::now() >= deadline {
      let cancelled = engine.cancel(run_id);
      warn!(
        run_id = %run_id,
        timeout_ms = policy.timeout.as_millis() as u64,
        cancelled,
        "run_timed_out"
      );
      return Err(OrchestratorError::Timeout {
        run_id: run_id.to_string(),
        waited: policy.timeout,
      });
    }
    debug!(run_id = %run_id, status = ?run.status, "run still in progress");
  }
}

fn failure_error(run: &WorkflowRun) -> OrchestratorError {
  let run_id = run.run_id.clone();
  match &run.failure {
    Some(failure) if failure.kind == FailureKind::Cancelled => OrchestratorError::Cancelled { run_id },
    Some(failure) => OrchestratorError::StepExecution {
      run_id,
      message: failure.message.clone(),
    },
    None => OrchestratorError::StepExecution {
      run_id,
      message: run.error.clone().unwrap_or_default(),
    },
  }
}

#[cfg(test)]
mod tests {
  use cardsmith_engine::{StepContext, StepError, StepRegistry, step_fn};
  use cardsmith_workflow::{TemplateCatalog, WorkflowTemplate};
  use serde_json::json;

  use super::*;

  fn engine(steps: StepRegistry) -> WorkflowEngine {
    let catalog = TemplateCatalog::new()
      .with(WorkflowTemplate::new("slow", "Slow", ["wait"]))
      .unwrap();
    WorkflowEngine::new(catalog, steps).unwrap()
  }

  #[tokio::test(start_paused = true)]
  async fn test_poll_times_out_and_cancels() {
    let engine = engine(StepRegistry::new().with(
      "wait",
      step_fn(|ctx: StepContext| async move {
        ctx.cancel.cancelled().await;
        Ok::<_, StepError>(json!(null))
      }),
    ));
    let run_id = engine.start("slow", json!({})).unwrap();
    let policy = PollPolicy::new(Duration::from_millis(100), Duration::from_secs(1));

    let err = poll_run(&engine, &run_id, policy).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::Timeout { .. }));
    assert!(err.retryable());
    let run = engine.get_status(&run_id).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.failure.unwrap().kind, FailureKind::Cancelled);
  }

  #[tokio::test(start_paused = true)]
  async fn test_poll_returns_completed_run() {
    let engine = engine(StepRegistry::new().with(
      "wait",
      step_fn(|_ctx: StepContext| async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok::<_, StepError>(json!({"done": true}))
      }),
    ));
    let run_id = engine.start("slow", json!({})).unwrap();

    let run = poll_run(&engine, &run_id, PollPolicy::default()).await.unwrap();

    assert_eq!(run.result, Some(json!({"done": true})));
  }

  #[tokio::test]
  async fn test_poll_unknown_run_vanished() {
    let engine = engine(StepRegistry::recording(["wait"]));
    let err = poll_run(&engine, "missing", PollPolicy::default())
      .await
      .unwrap_err();
    assert_eq!(err.code(), "run_vanished");
  }
}
