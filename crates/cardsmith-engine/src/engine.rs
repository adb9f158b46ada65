//! The workflow execution engine.
//!
//! `start` validates the workflow, records a `pending` run, and spawns a
//! driver task that executes the template's steps strictly in order. Callers
//! observe progress by polling [`WorkflowEngine::get_status`].

use std::sync::Arc;
use std::time::Duration;

use cardsmith_clock::{SharedClock, SystemClock};
use cardsmith_workflow::{TemplateCatalog, TemplateSummary};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Map, Value};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use crate::error::EngineError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::run::{FailureKind, RunFailure, WorkflowRun};
use crate::step::{Step, StepContext, StepRegistry};
use crate::table::RunTable;

/// Runs workflow templates and tracks their runs.
///
/// Construct once per process and share it (`Arc<WorkflowEngine>`); every
/// route or command that needs workflow execution uses the same instance.
pub struct WorkflowEngine {
  catalog: TemplateCatalog,
  steps: StepRegistry,
  runs: Arc<RunTable>,
  clock: SharedClock,
  notifier: Arc<dyn ExecutionNotifier>,
  shutdown: CancellationToken,
}

impl WorkflowEngine {
  /// Create an engine for `catalog`, with handlers from `steps`.
  ///
  /// # Errors
  /// Returns [`EngineError::Workflow`] for an invalid template and
  /// [`EngineError::MissingStep`] if any template names a step that has no
  /// handler in `steps`.
  pub fn new(catalog: TemplateCatalog, steps: StepRegistry) -> Result<Self, EngineError> {
    for template in catalog.templates() {
      template.validate()?;
      if let Some(step) = template.steps.iter().find(|s| !steps.contains(s)) {
        return Err(EngineError::MissingStep {
          workflow_id: template.workflow_id.clone(),
          step: step.clone(),
        });
      }
    }

    Ok(Self {
      catalog,
      steps,
      runs: Arc::new(RunTable::default()),
      clock: Arc::new(SystemClock),
      notifier: Arc::new(NoopNotifier),
      shutdown: CancellationToken::new(),
    })
  }

  pub fn with_clock(mut self, clock: SharedClock) -> Self {
    self.clock = clock;
    self
  }

  pub fn with_notifier(mut self, notifier: impl ExecutionNotifier + 'static) -> Self {
    self.notifier = Arc::new(notifier);
    self
  }

  pub fn catalog(&self) -> &TemplateCatalog {
    &self.catalog
  }

  /// Available workflow templates as `{ id, name, step_count }`.
  pub fn list_templates(&self) -> Vec<TemplateSummary> {
    self.catalog.summaries()
  }

  /// Start a run of `workflow_id` and return its id.
  ///
  /// The run is created `pending`; execution proceeds on a spawned task, so
  /// this must be called from within a tokio runtime.
  ///
  /// # Errors
  /// Returns [`EngineError::UnknownWorkflow`] without creating a run when the
  /// catalog has no such template.
  #[instrument(name = "engine_start", skip(self, input), fields(workflow_id = %workflow_id))]
  pub fn start(&self, workflow_id: &str, input: Value) -> Result<String, EngineError> {
    let template = self
      .catalog
      .get(workflow_id)
      .ok_or_else(|| EngineError::UnknownWorkflow {
        workflow_id: workflow_id.to_string(),
      })?;

    let steps = template
      .steps
      .iter()
      .map(|name| {
        self
          .steps
          .get(name)
          .map(|handler| (name.clone(), handler))
          .ok_or_else(|| EngineError::MissingStep {
            workflow_id: workflow_id.to_string(),
            step: name.clone(),
          })
      })
      .collect::<Result<Vec<_>, _>>()?;

    let run_id = uuid::Uuid::new_v4().to_string();
    let cancel = self.shutdown.child_token();
    self.runs.insert(
      WorkflowRun::new(
        run_id.clone(),
        workflow_id.to_string(),
        input.clone(),
        self.clock.now(),
      ),
      cancel.clone(),
    );

    info!(run_id = %run_id, step_count = steps.len(), "run_created");
    self.notifier.notify(ExecutionEvent::RunCreated {
      run_id: run_id.clone(),
      workflow_id: workflow_id.to_string(),
    });

    let span = info_span!("workflow_run", run_id = %run_id, workflow_id = %workflow_id);
    let driver = RunDriver {
      run_id: run_id.clone(),
      workflow_id: workflow_id.to_string(),
      input,
      steps,
      runs: self.runs.clone(),
      clock: self.clock.clone(),
      notifier: self.notifier.clone(),
      cancel,
    };
    tokio::spawn(driver.drive().instrument(span));

    Ok(run_id)
  }

  /// Latest snapshot of a run, or `None` if it never existed or was cleaned up.
  pub fn get_status(&self, run_id: &str) -> Option<WorkflowRun> {
    self.runs.snapshot(run_id)
  }

  /// Cancel a run that has not finished yet.
  ///
  /// The run becomes `failed` with a cancelled failure. Returns `false` (and
  /// changes nothing) for unknown or already-terminal runs.
  pub fn cancel(&self, run_id: &str) -> bool {
    let cancelled = self.runs.cancel(run_id, self.clock.now());
    if cancelled {
      warn!(run_id = %run_id, "run_cancelled");
      self.notifier.notify(ExecutionEvent::RunCancelled {
        run_id: run_id.to_string(),
      });
    }
    cancelled
  }

  /// Remove terminal runs that finished before `older_than`.
  ///
  /// Pending and running runs are never removed. Returns the number removed.
  pub fn cleanup(&self, older_than: DateTime<Utc>) -> usize {
    let removed = self.runs.cleanup(older_than);
    info!(removed, older_than = %older_than, "runs_cleaned_up");
    removed
  }

  /// Remove terminal runs that finished more than `age` ago.
  pub fn cleanup_older_than(&self, age: Duration) -> usize {
    let age = TimeDelta::from_std(age).unwrap_or(TimeDelta::MAX);
    let cutoff = self
      .clock
      .now()
      .checked_sub_signed(age)
      .unwrap_or(DateTime::<Utc>::MIN_UTC);
    self.cleanup(cutoff)
  }

  /// All tracked runs, oldest first.
  pub fn list_runs(&self) -> Vec<WorkflowRun> {
    self.runs.list()
  }

  pub fn run_count(&self) -> usize {
    self.runs.len()
  }

  /// Cancel every unfinished run and stop their driver tasks.
  pub fn shutdown(&self) -> usize {
    let cancelled = self
      .runs
      .active_ids()
      .iter()
      .filter(|run_id| self.cancel(run_id))
      .count();
    self.shutdown.cancel();
    info!(cancelled, "engine shut down");
    cancelled
  }
}

/// Everything a spawned run needs, detached from the engine's lifetime.
struct RunDriver {
  run_id: String,
  workflow_id: String,
  input: Value,
  steps: Vec<(String, Arc<dyn Step>)>,
  runs: Arc<RunTable>,
  clock: SharedClock,
  notifier: Arc<dyn ExecutionNotifier>,
  cancel: CancellationToken,
}

impl RunDriver {
  async fn drive(self) {
    if !self.runs.mark_running(&self.run_id) {
      debug!("run cancelled before it started");
      return;
    }
    info!("run_started");
    self.notifier.notify(ExecutionEvent::RunStarted {
      run_id: self.run_id.clone(),
      workflow_id: self.workflow_id.clone(),
    });

    let mut outputs = Map::new();
    let mut last = Value::Null;

    for (name, handler) in &self.steps {
      if self.cancel.is_cancelled() {
        self.fail_cancelled(name);
        return;
      }
      if !self.runs.begin_step(&self.run_id, name) {
        debug!(step = %name, "run no longer running, stopping");
        return;
      }
      info!(step = %name, "step_started");
      self.notifier.notify(ExecutionEvent::StepStarted {
        run_id: self.run_id.clone(),
        step: name.clone(),
      });

      let ctx = StepContext {
        run_id: self.run_id.clone(),
        workflow_id: self.workflow_id.clone(),
        step: name.clone(),
        input: self.input.clone(),
        outputs: outputs.clone(),
        cancel: self.cancel.clone(),
      };
      let handler = handler.clone();
      let task = tokio::spawn(async move { handler.run(ctx).await });
      let abort = task.abort_handle();

      let joined = tokio::select! {
          joined = task => joined,
          _ = self.cancel.cancelled() => {
              abort.abort();
              info!(step = %name, "run cancelled during step");
              self.fail_cancelled(name);
              return;
          }
      };

      match joined {
        Ok(Ok(output)) => {
          if !self.runs.finish_step(&self.run_id, name) {
            debug!(step = %name, "step output discarded, run already terminal");
            return;
          }
          info!(step = %name, "step_completed");
          self.notifier.notify(ExecutionEvent::StepCompleted {
            run_id: self.run_id.clone(),
            step: name.clone(),
          });
          outputs.insert(name.clone(), output.clone());
          last = output;
        }
        Ok(Err(e)) => {
          self.fail(name, FailureKind::Step, e.message);
          return;
        }
        Err(e) => {
          self.fail(name, FailureKind::Panicked, panic_message(name, e));
          return;
        }
      }
    }

    if self.runs.complete(&self.run_id, last, self.clock.now()) {
      info!("run_completed");
      self.notifier.notify(ExecutionEvent::RunCompleted {
        run_id: self.run_id.clone(),
      });
    } else {
      debug!("run result discarded, run already terminal");
    }
  }

  /// Settle a run whose token fired without going through `cancel`, e.g.
  /// one started while the engine was shutting down. No-op when the run is
  /// already terminal.
  fn fail_cancelled(&self, step: &str) {
    let failure = RunFailure::cancelled(Some(step.to_string()));
    if self.runs.fail(&self.run_id, failure, self.clock.now()) {
      warn!(step = %step, "run_cancelled");
      self.notifier.notify(ExecutionEvent::RunCancelled {
        run_id: self.run_id.clone(),
      });
    }
  }

  fn fail(&self, step: &str, kind: FailureKind, message: String) {
    let failure = RunFailure {
      kind,
      step: Some(step.to_string()),
      message: message.clone(),
    };
    if !self.runs.fail(&self.run_id, failure, self.clock.now()) {
      debug!(step = %step, "step failure discarded, run already terminal");
      return;
    }

    error!(step = %step, error = %message, "run_failed");
    self.notifier.notify(ExecutionEvent::StepFailed {
      run_id: self.run_id.clone(),
      step: step.to_string(),
      error: message.clone(),
    });
    self.notifier.notify(ExecutionEvent::RunFailed {
      run_id: self.run_id.clone(),
      error: message,
    });
  }
}

fn panic_message(step: &str, error: JoinError) -> String {
  if !error.is_panic() {
    return format!("step '{}' was aborted", step);
  }
  let payload = error.into_panic();
  let detail = payload
    .downcast_ref::<&str>()
    .map(|s| s.to_string())
    .or_else(|| payload.downcast_ref::<String>().cloned());
  match detail {
    Some(detail) => format!("step '{}' panicked: {}", step, detail),
    None => format!("step '{}' panicked", step),
  }
}
