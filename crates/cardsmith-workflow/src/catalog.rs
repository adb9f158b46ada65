use std::collections::BTreeMap;

use crate::error::WorkflowError;
use crate::ids;
use crate::template::{TemplateSummary, WorkflowTemplate};

/// The set of workflow templates that can be started.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
  templates: BTreeMap<String, WorkflowTemplate>,
}

impl TemplateCatalog {
  pub fn new() -> Self {
    Self::default()
  }

  /// Catalog holding the application's built-in workflows.
  pub fn builtin() -> Self {
    let templates = [
      WorkflowTemplate::new(
        ids::CARD_GENERATION,
        "Card Generation",
        [
          "scrape-content",
          "analyze-content",
          "generate-image",
          "connect-knowledge",
        ],
      ),
      WorkflowTemplate::new(
        ids::CONTENT_RECOMMENDATION,
        "Content Recommendation",
        ["load-profile", "rank-content"],
      ),
      WorkflowTemplate::new(
        ids::CONTENT_SEARCH,
        "Content Search",
        ["search-content", "rank-content"],
      ),
      WorkflowTemplate::new(
        ids::USER_ACHIEVEMENT,
        "User Achievement",
        ["load-activity", "evaluate-achievements"],
      ),
      WorkflowTemplate::new(
        ids::USER_ANALYTICS,
        "User Analytics",
        ["load-activity", "aggregate-metrics"],
      ),
      WorkflowTemplate::new(
        ids::USER_ENGAGEMENT,
        "User Engagement",
        ["load-activity", "score-engagement"],
      ),
      WorkflowTemplate::new(
        ids::TREND_ANALYSIS,
        "Trend Analysis",
        ["collect-signals", "detect-trends"],
      ),
    ];

    Self {
      templates: templates
        .into_iter()
        .map(|t| (t.workflow_id.clone(), t))
        .collect(),
    }
  }

  /// Add a template. Ids must be unique.
  pub fn register(&mut self, template: WorkflowTemplate) -> Result<(), WorkflowError> {
    template.validate()?;
    if self.templates.contains_key(&template.workflow_id) {
      return Err(WorkflowError::DuplicateTemplate(template.workflow_id));
    }
    self.templates.insert(template.workflow_id.clone(), template);
    Ok(())
  }

  /// Builder-style [`register`](Self::register).
  pub fn with(mut self, template: WorkflowTemplate) -> Result<Self, WorkflowError> {
    self.register(template)?;
    Ok(self)
  }

  pub fn get(&self, workflow_id: &str) -> Option<&WorkflowTemplate> {
    self.templates.get(workflow_id)
  }

  pub fn contains(&self, workflow_id: &str) -> bool {
    self.templates.contains_key(workflow_id)
  }

  /// Templates ordered by id.
  pub fn templates(&self) -> impl Iterator<Item = &WorkflowTemplate> {
    self.templates.values()
  }

  pub fn summaries(&self) -> Vec<TemplateSummary> {
    self.templates().map(WorkflowTemplate::summary).collect()
  }

  /// Every distinct step name used by any template.
  pub fn step_names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self
      .templates()
      .flat_map(|t| t.steps.iter().map(String::as_str))
      .collect();
    names.sort_unstable();
    names.dedup();
    names
  }

  pub fn len(&self) -> usize {
    self.templates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.templates.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_builtin_catalog() {
    let catalog = TemplateCatalog::builtin();
    assert_eq!(catalog.len(), 7);

    let card = catalog.get(ids::CARD_GENERATION).unwrap();
    assert_eq!(
      card.steps,
      vec![
        "scrape-content",
        "analyze-content",
        "generate-image",
        "connect-knowledge"
      ]
    );

    for id in [
      ids::CONTENT_RECOMMENDATION,
      ids::CONTENT_SEARCH,
      ids::USER_ACHIEVEMENT,
      ids::USER_ANALYTICS,
      ids::USER_ENGAGEMENT,
      ids::TREND_ANALYSIS,
    ] {
      assert!(catalog.contains(id), "missing {id}");
    }

    for template in catalog.templates() {
      template.validate().unwrap();
    }
  }

  #[test]
  fn test_register_rejects_duplicate_id() {
    let mut catalog = TemplateCatalog::builtin();
    let err = catalog
      .register(WorkflowTemplate::new(ids::CONTENT_SEARCH, "Again", ["x"]))
      .unwrap_err();
    assert!(matches!(err, WorkflowError::DuplicateTemplate(id) if id == ids::CONTENT_SEARCH));
  }

  #[test]
  fn test_summaries_sorted_by_id() {
    let catalog = TemplateCatalog::new()
      .with(WorkflowTemplate::new("b", "B", ["s1"]))
      .unwrap()
      .with(WorkflowTemplate::new("a", "A", ["s1", "s2"]))
      .unwrap();

    let summaries = catalog.summaries();
    assert_eq!(summaries[0].id, "a");
    assert_eq!(summaries[0].step_count, 2);
    assert_eq!(summaries[1].id, "b");
  }

  #[test]
  fn test_step_names_deduplicated() {
    let catalog = TemplateCatalog::builtin();
    let names = catalog.step_names();
    assert_eq!(names.iter().filter(|n| **n == "load-activity").count(), 1);
    assert!(names.contains(&"connect-knowledge"));
  }
}
