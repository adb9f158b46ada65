use std::time::Duration;

use cardsmith_cache::CacheError;
use cardsmith_engine::EngineError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced to callers of a cached workflow execution.
///
/// `Clone` because one in-flight execution result is handed to every caller
/// waiting on the same key.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrchestratorError {
  #[error("unknown workflow: {workflow_id}")]
  UnknownWorkflow { workflow_id: String },

  #[error("cannot derive cache key for workflow '{workflow_id}': {message}")]
  KeySerialization { workflow_id: String, message: String },

  #[error("{message}")]
  StepExecution { run_id: String, message: String },

  #[error("run {run_id} was cancelled")]
  Cancelled { run_id: String },

  #[error("run {run_id} timed out after {}ms", .waited.as_millis())]
  Timeout { run_id: String, waited: Duration },

  /// The run disappeared while being polled, e.g. removed by cleanup.
  #[error("run {run_id} disappeared before it finished")]
  RunVanished { run_id: String },

  #[error("run not found: {run_id}")]
  RunNotFound { run_id: String },

  /// The execution task itself died before reporting a result.
  #[error("execution of workflow '{workflow_id}' aborted: {message}")]
  Aborted { workflow_id: String, message: String },

  #[error("engine error: {message}")]
  Engine { message: String },
}

impl OrchestratorError {
  /// Whether repeating the same request may succeed.
  pub fn retryable(&self) -> bool {
    matches!(
      self,
      Self::StepExecution { .. }
        | Self::Cancelled { .. }
        | Self::Timeout { .. }
        | Self::RunVanished { .. }
        | Self::Aborted { .. }
    )
  }

  /// Stable machine-readable error code.
  pub fn code(&self) -> &'static str {
    match self {
      Self::UnknownWorkflow { .. } => "unknown_workflow",
      Self::KeySerialization { .. } => "key_serialization",
      Self::StepExecution { .. } => "step_execution",
      Self::Cancelled { .. } => "cancelled",
      Self::Timeout { .. } => "timeout",
      Self::RunVanished { .. } => "run_vanished",
      Self::RunNotFound { .. } => "run_not_found",
      Self::Aborted { .. } => "aborted",
      Self::Engine { .. } => "engine",
    }
  }

  pub fn to_response(&self) -> ErrorResponse {
    ErrorResponse {
      code: self.code().to_string(),
      message: self.to_string(),
      retryable: self.retryable(),
    }
  }
}

impl From<CacheError> for OrchestratorError {
  fn from(e: CacheError) -> Self {
    match e {
      CacheError::KeySerialization {
        workflow_id,
        source,
      } => Self::KeySerialization {
        workflow_id,
        message: source.to_string(),
      },
    }
  }
}

impl From<EngineError> for OrchestratorError {
  fn from(e: EngineError) -> Self {
    match e {
      EngineError::UnknownWorkflow { workflow_id } => Self::UnknownWorkflow { workflow_id },
      other => Self::Engine {
        message: other.to_string(),
      },
    }
  }
}

/// Structured error body returned to route callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
  pub code: String,
  pub message: String,
  pub retryable: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_retryable_classification() {
    let unknown = OrchestratorError::UnknownWorkflow {
      workflow_id: "nope".to_string(),
    };
    let timeout = OrchestratorError::Timeout {
      run_id: "r1".to_string(),
      waited: Duration::from_secs(120),
    };
    let step = OrchestratorError::StepExecution {
      run_id: "r1".to_string(),
      message: "db unreachable".to_string(),
    };

    assert!(!unknown.retryable());
    assert!(timeout.retryable());
    assert!(step.retryable());
    assert!(
      !OrchestratorError::KeySerialization {
        workflow_id: "w".to_string(),
        message: "bad".to_string(),
      }
      .retryable()
    );
  }

  #[test]
  fn test_error_response() {
    let response = OrchestratorError::Timeout {
      run_id: "r1".to_string(),
      waited: Duration::from_secs(2),
    }
    .to_response();

    assert_eq!(response.code, "timeout");
    assert_eq!(response.message, "run r1 timed out after 2000ms");
    assert!(response.retryable);

    let step = OrchestratorError::StepExecution {
      run_id: "r1".to_string(),
      message: "db unreachable".to_string(),
    };
    assert_eq!(step.to_response().message, "db unreachable");
  }

  #[test]
  fn test_from_engine_error() {
    let err: OrchestratorError = EngineError::UnknownWorkflow {
      workflow_id: "nope".to_string(),
    }
    .into();
    assert_eq!(err.code(), "unknown_workflow");
  }
}
