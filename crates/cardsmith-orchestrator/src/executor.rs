//! Cache-backed workflow execution.
//!
//! Every request goes through the same sequence:
//!
//! 1. derive the cache key (serialization errors surface immediately),
//! 2. return a fresh cached value without starting anything,
//! 3. otherwise join an execution already in flight for the same key,
//! 4. otherwise start the run, poll it, and cache the result on success.
//!
//! Steps 2 and 3 happen under one lock, and an in-flight entry is only
//! removed after its result is cached, so two requests for the same key
//! within one TTL window never both execute.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use cardsmith_cache::{CacheKey, ResultCache};
use cardsmith_engine::WorkflowEngine;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{Instrument, info, info_span, instrument, warn};

use crate::error::{ErrorResponse, OrchestratorError};
use crate::poll::{PollPolicy, poll_run};

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionSource {
  /// Served from the cache; nothing ran.
  Cache,
  /// This request started the run.
  Fresh,
  /// This request waited on a run another request started.
  Joined,
}

/// A successful workflow result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
  pub value: Value,
  pub source: ExecutionSource,
  /// The run that produced the value; `None` for cache hits.
  pub run_id: Option<String>,
}

#[derive(Debug, Clone)]
struct Finished {
  value: Value,
  run_id: String,
}

type SharedExecution = Shared<BoxFuture<'static, Result<Finished, OrchestratorError>>>;
type InFlight = Arc<Mutex<HashMap<String, SharedExecution>>>;

/// One entry of a warmup batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmupRequest {
  #[serde(alias = "workflowId")]
  pub workflow_id: String,
  #[serde(default)]
  pub input: Value,
}

impl WarmupRequest {
  pub fn new(workflow_id: impl Into<String>, input: Value) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      input,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmupFailure {
  pub workflow_id: String,
  pub error: ErrorResponse,
}

/// Outcome of a warmup batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmupReport {
  pub requested: usize,
  pub succeeded: usize,
  pub failed: Vec<WarmupFailure>,
}

/// Runs workflows through the result cache.
pub struct CachedExecutor {
  cache: Arc<ResultCache>,
  engine: Arc<WorkflowEngine>,
  poll: PollPolicy,
  in_flight: InFlight,
}

impl CachedExecutor {
  pub fn new(cache: Arc<ResultCache>, engine: Arc<WorkflowEngine>, poll: PollPolicy) -> Self {
    Self {
      cache,
      engine,
      poll,
      in_flight: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  pub fn cache(&self) -> &Arc<ResultCache> {
    &self.cache
  }

  pub fn engine(&self) -> &Arc<WorkflowEngine> {
    &self.engine
  }

  pub fn poll_policy(&self) -> PollPolicy {
    self.poll
  }

  /// Number of executions currently in flight.
  pub fn in_flight(&self) -> usize {
    self.lock().len()
  }

  /// Return the result of `workflow_id` for `input`, from cache when fresh.
  ///
  /// # Errors
  /// `UnknownWorkflow` and `KeySerialization` are returned before any run is
  /// started. Run failures and timeouts are returned without touching the
  /// cache.
  #[instrument(name = "cached_execute", skip(self, input), fields(workflow_id = %workflow_id))]
  pub async fn execute<T>(&self, workflow_id: &str, input: &T) -> Result<Execution, OrchestratorError>
  where
    T: Serialize + ?Sized,
  {
    let key = CacheKey::derive(workflow_id, input)?;
    if !self.engine.catalog().contains(workflow_id) {
      return Err(OrchestratorError::UnknownWorkflow {
        workflow_id: workflow_id.to_string(),
      });
    }
    // Derive succeeded, so this conversion cannot fail.
    let input = serde_json::to_value(input).unwrap_or(Value::Null);

    let (execution, source) = {
      let mut in_flight = self.lock();
      if let Some(value) = self.cache.get_by_key(&key) {
        return Ok(Execution {
          value,
          source: ExecutionSource::Cache,
          run_id: None,
        });
      }

      let key_str = key.to_string();
      match in_flight.get(&key_str) {
        Some(execution) => {
          info!(cache_key = %key_str, "joining in-flight execution");
          (execution.clone(), ExecutionSource::Joined)
        }
        None => {
          let execution = self.spawn_execution(key, input);
          in_flight.insert(key_str, execution.clone());
          (execution, ExecutionSource::Fresh)
        }
      }
    };

    let finished = execution.await?;
    Ok(Execution {
      value: finished.value,
      source,
      run_id: Some(finished.run_id),
    })
  }

  /// Execute and cache every request concurrently.
  ///
  /// A failing request is recorded in the report and does not stop the rest.
  pub async fn warmup(&self, requests: Vec<WarmupRequest>) -> WarmupReport {
    let requested = requests.len();
    info!(requested, "cache_warmup_started");

    let outcomes = futures::future::join_all(requests.iter().map(|request| async move {
      self
        .execute(&request.workflow_id, &request.input)
        .await
        .map_err(|e| WarmupFailure {
          workflow_id: request.workflow_id.clone(),
          error: e.to_response(),
        })
    }))
    .await;

    let failed: Vec<WarmupFailure> = outcomes.into_iter().filter_map(Result::err).collect();
    let report = WarmupReport {
      requested,
      succeeded: requested - failed.len(),
      failed,
    };
    info!(
      requested,
      succeeded = report.succeeded,
      failed = report.failed.len(),
      "cache_warmup_finished"
    );
    report
  }

  /// Spawn the leader task for `key`.
  ///
  /// The task owns the whole start/poll/cache sequence, so the result is
  /// cached even if every waiting caller goes away.
  fn spawn_execution(&self, key: CacheKey, input: Value) -> SharedExecution {
    let cache = self.cache.clone();
    let engine = self.engine.clone();
    let poll = self.poll;
    let guard = InFlightGuard {
      in_flight: self.in_flight.clone(),
      key: key.to_string(),
    };
    let workflow_id = key.workflow_id().to_string();

    let span = info_span!("cached_run", workflow_id = %workflow_id, cache_key = %key);
    let task = tokio::spawn(
      async move {
        let _guard = guard;
        let run_id = engine.start(key.workflow_id(), input)?;
        let run = poll_run(&engine, &run_id, poll).await?;
        let value = run.result.unwrap_or(Value::Null);
        cache.insert(&key, value.clone());
        info!(run_id = %run_id, "result_cached");
        Ok::<_, OrchestratorError>(Finished { value, run_id })
      }
      .instrument(span),
    );

    async move {
      match task.await {
        Ok(result) => result,
        Err(e) => {
          warn!(workflow_id = %workflow_id, error = %e, "execution task failed");
          Err(OrchestratorError::Aborted {
            workflow_id,
            message: e.to_string(),
          })
        }
      }
    }
    .boxed()
    .shared()
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, SharedExecution>> {
    self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
  }
}

/// Removes an in-flight entry when its execution task ends, however it ends.
struct InFlightGuard {
  in_flight: InFlight,
  key: String,
}

impl Drop for InFlightGuard {
  fn drop(&mut self) {
    self
      .in_flight
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .remove(&self.key);
  }
}
