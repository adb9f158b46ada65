//! Run lifecycle events.
//!
//! The engine reports every state change of a run to an [`ExecutionNotifier`].
//! Consumers decide what to do with them: stream to a UI, persist, or assert
//! on them in tests.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::run::RunStatus;

/// Events emitted while a run executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
  /// A run was created in `pending`.
  RunCreated { run_id: String, workflow_id: String },

  /// The run moved to `running`.
  RunStarted { run_id: String, workflow_id: String },

  StepStarted { run_id: String, step: String },

  StepCompleted { run_id: String, step: String },

  StepFailed {
    run_id: String,
    step: String,
    error: String,
  },

  RunCompleted { run_id: String },

  RunFailed { run_id: String, error: String },

  /// The run was cancelled; it is now `failed`.
  RunCancelled { run_id: String },
}

impl ExecutionEvent {
  pub fn run_id(&self) -> &str {
    match self {
      Self::RunCreated { run_id, .. }
      | Self::RunStarted { run_id, .. }
      | Self::StepStarted { run_id, .. }
      | Self::StepCompleted { run_id, .. }
      | Self::StepFailed { run_id, .. }
      | Self::RunCompleted { run_id }
      | Self::RunFailed { run_id, .. }
      | Self::RunCancelled { run_id } => run_id,
    }
  }

  /// The run status this event moves the run into, if it changes status.
  pub fn status(&self) -> Option<RunStatus> {
    match self {
      Self::RunCreated { .. } => Some(RunStatus::Pending),
      Self::RunStarted { .. } => Some(RunStatus::Running),
      Self::RunCompleted { .. } => Some(RunStatus::Completed),
      Self::RunFailed { .. } | Self::RunCancelled { .. } => Some(RunStatus::Failed),
      Self::StepStarted { .. } | Self::StepCompleted { .. } | Self::StepFailed { .. } => None,
    }
  }
}

/// Receives execution events.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Forwards events to an unbounded channel.
///
/// Unbounded so a slow consumer never stalls a run; event volume is a handful
/// per step.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with its receiving end.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}
