//! Cardsmith Cache
//!
//! An in-memory cache of workflow results. Entries are keyed by the workflow
//! id plus a digest of the canonicalized input, and expire after a
//! per-workflow time-to-live.
//!
//! # Expiry
//!
//! Expiry is lazy: every read path checks [`CacheEntry::is_expired`] against
//! the injected clock, so an expired entry is a miss even while it is still
//! physically stored. [`spawn_sweeper`] periodically removes expired entries
//! to reclaim memory; correctness never depends on it running.
//!
//! ```text
//! ResultCache
//! ├── get(workflow_id, input)      -> Option<Value>
//! ├── put(workflow_id, input, v)   -> CacheKey
//! ├── clear_workflow / clear_user / clear
//! ├── stats() / health_check()
//! └── sweep()                      <- spawn_sweeper(interval, cancel)
//! ```

mod cache;
mod entry;
mod error;
mod key;
mod sweep;
mod ttl;

pub use cache::{CacheHealth, CacheStats, HealthStatus, ResultCache};
pub use entry::CacheEntry;
pub use error::CacheError;
pub use key::{CacheKey, canonical_json};
pub use sweep::spawn_sweeper;
pub use ttl::TtlPolicy;
