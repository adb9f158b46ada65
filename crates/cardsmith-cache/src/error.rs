use thiserror::Error;

/// Errors raised by the result cache.
///
/// A missing or expired entry is not an error; lookups return `None`.
#[derive(Debug, Error)]
pub enum CacheError {
  /// The input could not be converted to JSON, so no key can be derived.
  #[error("cannot derive cache key for workflow '{workflow_id}': {source}")]
  KeySerialization {
    workflow_id: String,
    #[source]
    source: serde_json::Error,
  },
}
