//! Engine error types.

use cardsmith_workflow::WorkflowError;
use thiserror::Error;

/// Errors returned synchronously by the engine.
///
/// Failures that happen while a run executes are not returned here; they are
/// recorded on the run and observed by polling its status.
#[derive(Debug, Error)]
pub enum EngineError {
  /// `start` named a workflow the catalog does not contain.
  #[error("unknown workflow '{workflow_id}'")]
  UnknownWorkflow { workflow_id: String },

  /// A template references a step with no registered handler.
  #[error("workflow '{workflow_id}' uses step '{step}' which has no registered handler")]
  MissingStep { workflow_id: String, step: String },

  #[error(transparent)]
  Workflow(#[from] WorkflowError),
}

/// Error returned by a step handler.
///
/// The message becomes the run's terminal `error` verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StepError {
  pub message: String,
}

impl StepError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

impl From<String> for StepError {
  fn from(message: String) -> Self {
    Self { message }
  }
}

impl From<&str> for StepError {
  fn from(message: &str) -> Self {
    Self::new(message)
  }
}
