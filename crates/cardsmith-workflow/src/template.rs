use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
  pub workflow_id: String,
  pub name: String,
  /// Step names in execution order.
  pub steps: Vec<String>,
}

impl WorkflowTemplate {
  pub fn new<I, S>(workflow_id: impl Into<String>, name: impl Into<String>, steps: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      workflow_id: workflow_id.into(),
      name: name.into(),
      steps: steps.into_iter().map(Into::into).collect(),
    }
  }

  /// Check that the template has steps and no step name repeats.
  pub fn validate(&self) -> Result<(), WorkflowError> {
    if self.steps.is_empty() {
      return Err(WorkflowError::EmptyTemplate(self.workflow_id.clone()));
    }

    let mut seen = HashSet::new();
    for step in &self.steps {
      if !seen.insert(step.as_str()) {
        return Err(WorkflowError::DuplicateStep {
          workflow_id: self.workflow_id.clone(),
          step: step.clone(),
        });
      }
    }
    Ok(())
  }

  pub fn summary(&self) -> TemplateSummary {
    TemplateSummary {
      id: self.workflow_id.clone(),
      name: self.name.clone(),
      step_count: self.steps.len(),
    }
  }
}

/// Listing entry for a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSummary {
  pub id: String,
  pub name: String,
  pub step_count: usize,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_validate_rejects_empty() {
    let template = WorkflowTemplate::new("empty", "Empty", Vec::<String>::new());
    assert!(matches!(
      template.validate(),
      Err(WorkflowError::EmptyTemplate(id)) if id == "empty"
    ));
  }

  #[test]
  fn test_validate_rejects_duplicate_steps() {
    let template = WorkflowTemplate::new("dup", "Dup", ["a", "b", "a"]);
    assert!(matches!(
      template.validate(),
      Err(WorkflowError::DuplicateStep { step, .. }) if step == "a"
    ));
  }

  #[test]
  fn test_summary() {
    let template = WorkflowTemplate::new("w", "Workflow", ["a", "b"]);
    assert_eq!(
      template.summary(),
      TemplateSummary {
        id: "w".to_string(),
        name: "Workflow".to_string(),
        step_count: 2,
      }
    );
  }
}
