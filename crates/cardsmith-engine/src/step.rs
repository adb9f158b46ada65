//! Step handlers.
//!
//! A [`Step`] is the executable behind a step name in a workflow template.
//! Handlers are registered in a [`StepRegistry`] by name; one handler can serve
//! the same step name in several templates.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

use crate::error::StepError;

/// Everything a step sees when it runs.
#[derive(Debug, Clone)]
pub struct StepContext {
  pub run_id: String,
  pub workflow_id: String,
  /// Name of the step being executed.
  pub step: String,
  /// The run's original input.
  pub input: Value,
  /// Outputs of the steps that already ran, keyed by step name.
  pub outputs: Map<String, Value>,
  /// Fires when the run is cancelled. Long-running steps should watch it.
  pub cancel: CancellationToken,
}

impl StepContext {
  /// Output of an earlier step.
  pub fn output_of(&self, step: &str) -> Option<&Value> {
    self.outputs.get(step)
  }
}

/// An executable workflow step.
#[async_trait]
pub trait Step: Send + Sync {
  async fn run(&self, ctx: StepContext) -> Result<Value, StepError>;
}

/// Adapter turning an async closure into a [`Step`].
pub struct FnStep<F>(F);

/// Wrap an async closure as a step handler.
///
/// ```ignore
/// registry.register("load-profile", step_fn(|ctx| async move {
///     Ok(json!({ "user": ctx.input["userId"] }))
/// }));
/// ```
pub fn step_fn<F, Fut>(f: F) -> FnStep<F>
where
  F: Fn(StepContext) -> Fut + Send + Sync,
  Fut: Future<Output = Result<Value, StepError>> + Send,
{
  FnStep(f)
}

#[async_trait]
impl<F, Fut> Step for FnStep<F>
where
  F: Fn(StepContext) -> Fut + Send + Sync,
  Fut: Future<Output = Result<Value, StepError>> + Send,
{
  async fn run(&self, ctx: StepContext) -> Result<Value, StepError> {
    (self.0)(ctx).await
  }
}

/// Deterministic step that reports what it received.
///
/// Output: `{ "step", "workflow_id", "input", "previous" }`, where `previous`
/// lists the steps that ran before it. Lets a template run end to end
/// without any external provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordStep;

#[async_trait]
impl Step for RecordStep {
  async fn run(&self, ctx: StepContext) -> Result<Value, StepError> {
    let previous: Vec<&String> = ctx.outputs.keys().collect();
    Ok(json!({
      "step": ctx.step,
      "workflow_id": ctx.workflow_id,
      "input": ctx.input,
      "previous": previous,
    }))
  }
}

/// Step handlers keyed by step name.
#[derive(Clone, Default)]
pub struct StepRegistry {
  steps: HashMap<String, Arc<dyn Step>>,
}

impl StepRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry with a [`RecordStep`] for every given step name.
  pub fn recording<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
    let mut registry = Self::new();
    for name in names {
      registry.register(name, RecordStep);
    }
    registry
  }

  /// Register (or replace) the handler for `name`.
  pub fn register(&mut self, name: impl Into<String>, step: impl Step + 'static) {
    self.steps.insert(name.into(), Arc::new(step));
  }

  /// Builder-style [`register`](Self::register).
  pub fn with(mut self, name: impl Into<String>, step: impl Step + 'static) -> Self {
    self.register(name, step);
    self
  }

  pub fn get(&self, name: &str) -> Option<Arc<dyn Step>> {
    self.steps.get(name).cloned()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.steps.contains_key(name)
  }
}

impl std::fmt::Debug for StepRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut names: Vec<&String> = self.steps.keys().collect();
    names.sort();
    f.debug_struct("StepRegistry").field("steps", &names).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn context(outputs: Map<String, Value>) -> StepContext {
    StepContext {
      run_id: "run-1".to_string(),
      workflow_id: "card-generation".to_string(),
      step: "analyze-content".to_string(),
      input: json!({"url": "https://example.com"}),
      outputs,
      cancel: CancellationToken::new(),
    }
  }

  #[tokio::test]
  async fn test_record_step_output() {
    let mut outputs = Map::new();
    outputs.insert("scrape-content".to_string(), json!({"text": "..."}));

    let output = RecordStep.run(context(outputs)).await.unwrap();

    assert_eq!(output["step"], "analyze-content");
    assert_eq!(output["workflow_id"], "card-generation");
    assert_eq!(output["input"]["url"], "https://example.com");
    assert_eq!(output["previous"], json!(["scrape-content"]));
  }

  #[tokio::test]
  async fn test_step_fn_adapter() {
    let step = step_fn(|ctx: StepContext| async move {
      let text = ctx
        .output_of("scrape-content")
        .and_then(|v| v["text"].as_str())
        .ok_or_else(|| StepError::new("no scraped text"))?
        .to_string();
      Ok::<_, StepError>(json!({ "length": text.len() }))
    });

    let mut outputs = Map::new();
    outputs.insert("scrape-content".to_string(), json!({"text": "hello"}));
    assert_eq!(step.run(context(outputs)).await.unwrap(), json!({"length": 5}));

    let err = step.run(context(Map::new())).await.unwrap_err();
    assert_eq!(err.message, "no scraped text");
  }

  #[test]
  fn test_registry_lookup() {
    let registry = StepRegistry::recording(["a", "b"]);
    assert!(registry.contains("a"));
    assert!(registry.get("b").is_some());
    assert!(registry.get("c").is_none());
  }
}
