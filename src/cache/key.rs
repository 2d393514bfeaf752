//! Cache key derivation.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Namespace prefix shared by every cache key in the store.
pub const CACHE_PREFIX: &str = "cache:";

/// Derive the storage key for an `(endpoint, params)` pair.
///
/// Parameters are canonicalized first, so two objects with the same fields
/// map to the same key whatever order they were built in. Absent params and
/// JSON `null` are equivalent.
pub fn derive_key(endpoint: &str, params: Option<&Value>) -> String {
  let canonical = canonicalize(params.unwrap_or(&Value::Null));
  let serialized = serde_json::to_string(&canonical).unwrap_or_default();

  // SHA256 hash for stable, fixed-length keys
  let mut hasher = Sha256::new();
  hasher.update(endpoint.as_bytes());
  hasher.update([0u8]);
  hasher.update(serialized.as_bytes());
  format!("{}{}", CACHE_PREFIX, hex::encode(hasher.finalize()))
}

/// Whether a store key belongs to the cache namespace.
pub fn is_cache_key(key: &str) -> bool {
  key.starts_with(CACHE_PREFIX)
}

/// Rebuild a value with every object's keys in sorted order.
fn canonicalize(value: &Value) -> Value {
  match value {
    Value::Object(map) => {
      let mut entries: Vec<(&String, &Value)> = map.iter().collect();
      entries.sort_by(|a, b| a.0.cmp(b.0));

      let mut sorted = Map::new();
      for (k, v) in entries {
        sorted.insert(k.clone(), canonicalize(v));
      }
      Value::Object(sorted)
    }
    Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
    other => other.clone(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_key_is_stable() {
    let params = json!({"class": "7B", "page": 2});
    assert_eq!(
      derive_key("/students", Some(&params)),
      derive_key("/students", Some(&params))
    );
  }

  #[test]
  fn test_key_ignores_field_order() {
    let mut a = Map::new();
    a.insert("term".into(), json!("spring"));
    a.insert("filter".into(), json!({"role": "parent", "active": true}));

    let mut inner = Map::new();
    inner.insert("active".into(), json!(true));
    inner.insert("role".into(), json!("parent"));
    let mut b = Map::new();
    b.insert("filter".into(), Value::Object(inner));
    b.insert("term".into(), json!("spring"));

    assert_eq!(
      derive_key("/messages", Some(&Value::Object(a))),
      derive_key("/messages", Some(&Value::Object(b)))
    );
  }

  #[test]
  fn test_absent_params_match_null() {
    assert_eq!(
      derive_key("/ratings", None),
      derive_key("/ratings", Some(&Value::Null))
    );
  }

  #[test]
  fn test_key_distinguishes_inputs() {
    let base = derive_key("/payments", Some(&json!({"id": 1})));
    assert_ne!(base, derive_key("/payments", Some(&json!({"id": 2}))));
    assert_ne!(base, derive_key("/payment", Some(&json!({"id": 1}))));
    // Array order is significant
    assert_ne!(
      derive_key("/payments", Some(&json!([1, 2]))),
      derive_key("/payments", Some(&json!([2, 1])))
    );
  }

  #[test]
  fn test_key_is_namespaced() {
    let key = derive_key("/teachers", None);
    assert!(is_cache_key(&key));
    assert!(!is_cache_key("offline_queue"));
  }
}
