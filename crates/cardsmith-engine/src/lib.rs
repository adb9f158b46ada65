//! Cardsmith Engine
//!
//! Executes workflow templates as asynchronous runs and exposes them through
//! a polling interface.
//!
//! # Architecture
//!
//! ```text
//! WorkflowEngine
//! ├── start(workflow_id, input) -> run_id   (spawns a RunDriver task)
//! ├── get_status(run_id)        -> Option<WorkflowRun>
//! ├── cancel(run_id)            -> bool
//! └── cleanup(older_than)       -> removed count
//!
//! RunDriver
//! └── pending -> running -> step 1 -> step 2 -> ... -> completed | failed
//! ```
//!
//! Steps run strictly in template order, each in its own task so a panic is
//! contained. A step failure fails the run immediately and later steps never
//! run. Cancellation is cooperative: the run is marked `failed` at once, the
//! in-flight step is aborted, and any result it still produces is discarded.
//!
//! # Usage
//!
//! ```ignore
//! let steps = StepRegistry::recording(catalog.step_names());
//! let engine = WorkflowEngine::new(catalog, steps)?;
//!
//! let run_id = engine.start("card-generation", json!({ "url": url }))?;
//! loop {
//!     let run = engine.get_status(&run_id).unwrap();
//!     if run.is_terminal() { break; }
//!     tokio::time::sleep(Duration::from_millis(250)).await;
//! }
//! ```

mod engine;
mod error;
mod events;
mod run;
mod step;
mod table;

pub use engine::WorkflowEngine;
pub use error::{EngineError, StepError};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use run::{FailureKind, RunFailure, RunStatus, WorkflowRun};
pub use step::{FnStep, RecordStep, Step, StepContext, StepRegistry, step_fn};
