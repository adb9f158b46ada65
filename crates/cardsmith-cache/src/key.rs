//! Cache key derivation.
//!
//! A key is the SHA-256 of the workflow id and the canonical JSON form of the
//! input. Canonical JSON sorts object keys at every depth and carries no
//! whitespace, so two inputs with the same logical content but a different
//! field order map to the same key.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::CacheError;

/// Top-level input fields recognized as a user identifier.
const USER_ID_FIELDS: [&str; 2] = ["userId", "user_id"];

/// Key for a cached workflow result.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct CacheKey {
  workflow_id: String,
  digest: String,
  user_id: Option<String>,
}

impl CacheKey {
  /// Derive the key for `input` under `workflow_id`.
  pub fn derive<T>(workflow_id: &str, input: &T) -> Result<Self, CacheError>
  where
    T: Serialize + ?Sized,
  {
    let value = serde_json::to_value(input).map_err(|source| CacheError::KeySerialization {
      workflow_id: workflow_id.to_string(),
      source,
    })?;
    Ok(Self::from_value(workflow_id, &value))
  }

  /// Derive the key for an input that is already JSON.
  pub fn from_value(workflow_id: &str, input: &Value) -> Self {
    let canonical = canonical_json(input);

    let mut hasher = Sha256::new();
    hasher.update(workflow_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical.as_bytes());

    Self {
      workflow_id: workflow_id.to_string(),
      digest: format!("{:x}", hasher.finalize()),
      user_id: extract_user_id(input),
    }
  }

  pub fn workflow_id(&self) -> &str {
    &self.workflow_id
  }

  pub fn digest(&self) -> &str {
    &self.digest
  }

  /// User the input belongs to, when it carries a `userId`/`user_id` field.
  pub fn user_id(&self) -> Option<&str> {
    self.user_id.as_deref()
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.workflow_id, self.digest)
  }
}

/// Render `value` as canonical JSON.
pub fn canonical_json(value: &Value) -> String {
  let mut out = String::new();
  write_canonical(value, &mut out);
  out
}

fn write_canonical(value: &Value, out: &mut String) {
  match value {
    Value::Object(map) => {
      let mut keys: Vec<&String> = map.keys().collect();
      keys.sort();
      out.push('{');
      for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_canonical(&map[key.as_str()], out);
      }
      out.push('}');
    }
    Value::Array(items) => {
      out.push('[');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        write_canonical(item, out);
      }
      out.push(']');
    }
    scalar => out.push_str(&scalar.to_string()),
  }
}

fn extract_user_id(input: &Value) -> Option<String> {
  let object = input.as_object()?;
  USER_ID_FIELDS
    .iter()
    .filter_map(|field| object.get(*field))
    .find_map(|value| match value {
      Value::String(s) if !s.is_empty() => Some(s.clone()),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    })
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use serde_json::json;

  use super::*;

  #[test]
  fn test_canonical_json_sorts_nested_keys() {
    let value = json!({"b": 1, "a": {"z": [3, {"y": true, "x": null}], "c": "s"}});
    assert_eq!(
      canonical_json(&value),
      r#"{"a":{"c":"s","z":[3,{"x":null,"y":true}]},"b":1}"#
    );
  }

  #[test]
  fn test_key_ignores_field_order() {
    let a = CacheKey::derive("trend-analysis", &json!({"limit": 20, "timeRange": "7d"})).unwrap();
    let b = CacheKey::derive("trend-analysis", &json!({"timeRange": "7d", "limit": 20})).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn test_key_depends_on_workflow() {
    let input = json!({"q": "rust"});
    let a = CacheKey::derive("content-search", &input).unwrap();
    let b = CacheKey::derive("content-recommendation", &input).unwrap();
    assert_ne!(a.digest(), b.digest());
  }

  #[test]
  fn test_array_order_is_significant() {
    let a = CacheKey::derive("w", &json!({"tags": ["a", "b"]})).unwrap();
    let b = CacheKey::derive("w", &json!({"tags": ["b", "a"]})).unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn test_user_id_extraction() {
    let camel = CacheKey::derive("w", &json!({"userId": "u1"})).unwrap();
    let snake = CacheKey::derive("w", &json!({"user_id": 42})).unwrap();
    let none = CacheKey::derive("w", &json!({"owner": "u1"})).unwrap();
    let nested = CacheKey::derive("w", &json!({"filter": {"userId": "u1"}})).unwrap();

    assert_eq!(camel.user_id(), Some("u1"));
    assert_eq!(snake.user_id(), Some("42"));
    assert_eq!(none.user_id(), None);
    assert_eq!(nested.user_id(), None);
  }

  #[test]
  fn test_unserializable_input() {
    let mut input = HashMap::new();
    input.insert((1u8, 2u8), "tuple keys are not valid JSON object keys");

    let err = CacheKey::derive("w", &input).unwrap_err();
    assert!(matches!(err, CacheError::KeySerialization { ref workflow_id, .. } if workflow_id == "w"));
  }

  #[test]
  fn test_display() {
    let key = CacheKey::derive("content-search", &json!({})).unwrap();
    assert_eq!(key.to_string(), format!("content-search:{}", key.digest()));
    assert_eq!(key.digest().len(), 64);
  }
}
