//! Cardsmith Workflow
//!
//! A workflow template is a named, ordered list of steps. Templates carry
//! only step names; the engine binds each name to an executable step handler.
//!
//! [`TemplateCatalog::builtin`] holds the workflows the application exposes:
//!
//! | id | steps |
//! |----|-------|
//! | `card-generation` | scrape-content, analyze-content, generate-image, connect-knowledge |
//! | `content-recommendation` | load-profile, rank-content |
//! | `content-search` | search-content, rank-content |
//! | `user-achievement` | load-activity, evaluate-achievements |
//! | `user-analytics` | load-activity, aggregate-metrics |
//! | `user-engagement` | load-activity, score-engagement |
//! | `trend-analysis` | collect-signals, detect-trends |

mod catalog;
mod error;
mod template;

pub mod ids;

pub use catalog::TemplateCatalog;
pub use error::WorkflowError;
pub use template::{TemplateSummary, WorkflowTemplate};
