//! Run records and the run state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a run.
///
/// Runs only move forward: `Pending -> Running -> {Completed, Failed}`, and
/// `Pending -> Failed` when cancelled before the first step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Pending,
  Running,
  Completed,
  Failed,
}

impl RunStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Failed)
  }

  /// Whether moving from `self` to `next` is a legal forward transition.
  pub fn can_transition_to(self, next: RunStatus) -> bool {
    match (self, next) {
      (Self::Pending, Self::Running | Self::Failed) => true,
      (Self::Running, Self::Completed | Self::Failed) => true,
      _ => false,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  /// A step returned an error.
  Step,
  /// A step panicked.
  Panicked,
  /// The run was cancelled before it finished.
  Cancelled,
}

/// Why a run failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
  pub kind: FailureKind,
  /// Step that was executing, if any.
  pub step: Option<String>,
  pub message: String,
}

impl RunFailure {
  pub fn cancelled(step: Option<String>) -> Self {
    Self {
      kind: FailureKind::Cancelled,
      step,
      message: "cancelled".to_string(),
    }
  }
}

/// Snapshot of one workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
  pub run_id: String,
  pub workflow_id: String,
  pub status: RunStatus,
  pub input: serde_json::Value,
  /// Output of the final step, set only when `Completed`.
  pub result: Option<serde_json::Value>,
  /// Failure message, set only when `Failed`.
  pub error: Option<String>,
  pub failure: Option<RunFailure>,
  /// Step currently executing.
  pub current_step: Option<String>,
  /// Steps that finished successfully, in order.
  pub completed_steps: Vec<String>,
  pub started_at: DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
  pub(crate) fn new(
    run_id: String,
    workflow_id: String,
    input: serde_json::Value,
    started_at: DateTime<Utc>,
  ) -> Self {
    Self {
      run_id,
      workflow_id,
      status: RunStatus::Pending,
      input,
      result: None,
      error: None,
      failure: None,
      current_step: None,
      completed_steps: Vec::new(),
      started_at,
      finished_at: None,
    }
  }

  pub fn is_terminal(&self) -> bool {
    self.status.is_terminal()
  }
}
