//! The process-wide run table.
//!
//! Every state change happens inside one lock acquisition and refuses illegal
//! transitions, so a run can never be observed half-updated or moving
//! backwards, no matter how driver tasks and `cancel` calls interleave.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::run::{RunFailure, RunStatus, WorkflowRun};

struct RunSlot {
  run: WorkflowRun,
  cancel: CancellationToken,
}

#[derive(Default)]
pub(crate) struct RunTable {
  runs: RwLock<HashMap<String, RunSlot>>,
}

impl RunTable {
  pub(crate) fn insert(&self, run: WorkflowRun, cancel: CancellationToken) {
    self
      .write()
      .insert(run.run_id.clone(), RunSlot { run, cancel });
  }

  pub(crate) fn snapshot(&self, run_id: &str) -> Option<WorkflowRun> {
    self.read().get(run_id).map(|slot| slot.run.clone())
  }

  pub(crate) fn list(&self) -> Vec<WorkflowRun> {
    let mut runs: Vec<WorkflowRun> = self.read().values().map(|slot| slot.run.clone()).collect();
    runs.sort_by(|a, b| {
      a.started_at
        .cmp(&b.started_at)
        .then_with(|| a.run_id.cmp(&b.run_id))
    });
    runs
  }

  pub(crate) fn len(&self) -> usize {
    self.read().len()
  }

  /// Ids of runs that have not reached a terminal status.
  pub(crate) fn active_ids(&self) -> Vec<String> {
    self
      .read()
      .values()
      .filter(|slot| !slot.run.is_terminal())
      .map(|slot| slot.run.run_id.clone())
      .collect()
  }

  /// `pending -> running`.
  pub(crate) fn mark_running(&self, run_id: &str) -> bool {
    self.transition(run_id, RunStatus::Running, |_| {})
  }

  /// Record that `step` is executing. Only valid while running.
  pub(crate) fn begin_step(&self, run_id: &str, step: &str) -> bool {
    self.update_running(run_id, |run| run.current_step = Some(step.to_string()))
  }

  /// Record that `step` finished. Only valid while running.
  pub(crate) fn finish_step(&self, run_id: &str, step: &str) -> bool {
    self.update_running(run_id, |run| {
      run.current_step = None;
      run.completed_steps.push(step.to_string());
    })
  }

  /// `running -> completed`.
  pub(crate) fn complete(
    &self,
    run_id: &str,
    result: serde_json::Value,
    now: DateTime<Utc>,
  ) -> bool {
    self.transition(run_id, RunStatus::Completed, |run| {
      run.result = Some(result);
      run.current_step = None;
      run.finished_at = Some(now);
    })
  }

  /// `pending | running -> failed`.
  pub(crate) fn fail(&self, run_id: &str, failure: RunFailure, now: DateTime<Utc>) -> bool {
    self.transition(run_id, RunStatus::Failed, |run| {
      run.error = Some(failure.message.clone());
      run.failure = Some(failure);
      run.current_step = None;
      run.finished_at = Some(now);
    })
  }

  /// Fail a non-terminal run as cancelled and fire its token.
  ///
  /// The failure names the step that was executing, if any.
  pub(crate) fn cancel(&self, run_id: &str, now: DateTime<Utc>) -> bool {
    let mut runs = self.write();
    let Some(slot) = runs.get_mut(run_id) else {
      return false;
    };
    if !slot.run.status.can_transition_to(RunStatus::Failed) {
      return false;
    }

    let failure = RunFailure::cancelled(slot.run.current_step.clone());
    slot.run.status = RunStatus::Failed;
    slot.run.error = Some(failure.message.clone());
    slot.run.failure = Some(failure);
    slot.run.current_step = None;
    slot.run.finished_at = Some(now);
    slot.cancel.cancel();
    true
  }

  /// Remove terminal runs that finished before `older_than`.
  pub(crate) fn cleanup(&self, older_than: DateTime<Utc>) -> usize {
    let mut runs = self.write();
    let before = runs.len();
    runs.retain(|_, slot| {
      !(slot.run.is_terminal() && slot.run.finished_at.is_some_and(|t| t < older_than))
    });
    before - runs.len()
  }

  fn transition(
    &self,
    run_id: &str,
    next: RunStatus,
    apply: impl FnOnce(&mut WorkflowRun),
  ) -> bool {
    let mut runs = self.write();
    match runs.get_mut(run_id) {
      Some(slot) if slot.run.status.can_transition_to(next) => {
        slot.run.status = next;
        apply(&mut slot.run);
        true
      }
      _ => false,
    }
  }

  fn update_running(&self, run_id: &str, apply: impl FnOnce(&mut WorkflowRun)) -> bool {
    let mut runs = self.write();
    match runs.get_mut(run_id) {
      Some(slot) if slot.run.status == RunStatus::Running => {
        apply(&mut slot.run);
        true
      }
      _ => false,
    }
  }

  fn read(&self) -> RwLockReadGuard<'_, HashMap<String, RunSlot>> {
    self.runs.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, RunSlot>> {
    self.runs.write().unwrap_or_else(|e| e.into_inner())
  }
}
