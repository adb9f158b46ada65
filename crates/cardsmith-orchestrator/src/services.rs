//! The application service container.

use std::sync::Arc;

use cardsmith_cache::{ResultCache, spawn_sweeper};
use cardsmith_clock::{SharedClock, SystemClock};
use cardsmith_config::Config;
use cardsmith_engine::{EngineError, StepRegistry, WorkflowEngine};
use cardsmith_workflow::TemplateCatalog;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::admin::{CacheAdmin, WorkflowAdmin};
use crate::executor::CachedExecutor;
use crate::poll::PollPolicy;

/// Process-wide services, constructed once and passed to whatever needs them.
///
/// Tests build their own isolated instance; nothing here is global.
pub struct Services {
  config: Config,
  clock: SharedClock,
  cache: Arc<ResultCache>,
  engine: Arc<WorkflowEngine>,
  executor: Arc<CachedExecutor>,
  shutdown: CancellationToken,
  sweeper: Option<JoinHandle<()>>,
}

impl Services {
  /// Build the services with the system clock and start the cache sweeper.
  ///
  /// Must be called from within a tokio runtime.
  pub fn start(
    config: Config,
    catalog: TemplateCatalog,
    steps: StepRegistry,
  ) -> Result<Self, EngineError> {
    Self::start_with_clock(config, catalog, steps, Arc::new(SystemClock))
  }

  pub fn start_with_clock(
    config: Config,
    catalog: TemplateCatalog,
    steps: StepRegistry,
    clock: SharedClock,
  ) -> Result<Self, EngineError> {
    let engine = Arc::new(WorkflowEngine::new(catalog, steps)?.with_clock(clock.clone()));
    let cache = Arc::new(ResultCache::from_config(&config.cache, clock.clone()));
    let executor = Arc::new(CachedExecutor::new(
      cache.clone(),
      engine.clone(),
      PollPolicy::from_config(&config.polling),
    ));

    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(
      cache.clone(),
      config.cache.sweep_interval(),
      shutdown.child_token(),
    );
    info!(
      templates = engine.catalog().len(),
      sweep_interval_secs = config.cache.sweep_interval_secs,
      "services_started"
    );

    Ok(Self {
      config,
      clock,
      cache,
      engine,
      executor,
      shutdown,
      sweeper: Some(sweeper),
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn clock(&self) -> &SharedClock {
    &self.clock
  }

  pub fn cache(&self) -> &Arc<ResultCache> {
    &self.cache
  }

  pub fn engine(&self) -> &Arc<WorkflowEngine> {
    &self.engine
  }

  pub fn executor(&self) -> &Arc<CachedExecutor> {
    &self.executor
  }

  pub fn cache_admin(&self) -> CacheAdmin {
    CacheAdmin::new(self.executor.clone())
  }

  pub fn workflow_admin(&self) -> WorkflowAdmin {
    WorkflowAdmin::new(self.engine.clone()).with_retention(self.config.engine.run_retention())
  }

  /// Stop the sweeper and cancel every unfinished run.
  pub async fn shutdown(mut self) {
    self.shutdown.cancel();
    let cancelled = self.engine.shutdown();
    if let Some(sweeper) = self.sweeper.take() {
      if let Err(e) = sweeper.await {
        warn!(error = %e, "cache sweeper task failed");
      }
    }
    info!(cancelled_runs = cancelled, "services_stopped");
  }
}
