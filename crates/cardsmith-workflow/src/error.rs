use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("workflow template '{0}' is already registered")]
  DuplicateTemplate(String),

  #[error("workflow template '{0}' has no steps")]
  EmptyTemplate(String),

  #[error("workflow template '{workflow_id}' declares step '{step}' more than once")]
  DuplicateStep { workflow_id: String, step: String },
}
