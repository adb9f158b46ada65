//! Cardsmith Orchestrator
//!
//! Connects the result cache to the workflow engine. Route handlers call
//! [`CachedExecutor::execute`] instead of driving the engine themselves:
//!
//! ```text
//! execute(workflow_id, input)
//!   ├── cache hit            -> value, nothing runs
//!   ├── same key in flight   -> await the running execution
//!   └── miss                 -> start, poll, cache on success
//! ```
//!
//! Failures and timeouts are never cached. [`OrchestratorError::retryable`]
//! tells callers whether trying again can help.
//!
//! [`CacheAdmin`] and [`WorkflowAdmin`] expose the management operations, and
//! [`Services`] wires everything together from a [`cardsmith_config::Config`].

mod admin;
mod error;
mod executor;
mod poll;
mod services;

pub use admin::{
  CacheAdmin, CacheOverview, ClearReport, ClearScope, CleanupReport, StopReport, WorkflowAdmin,
};
pub use error::{ErrorResponse, OrchestratorError};
pub use executor::{
  CachedExecutor, Execution, ExecutionSource, WarmupFailure, WarmupReport, WarmupRequest,
};
pub use poll::{PollPolicy, poll_run};
pub use services::Services;
