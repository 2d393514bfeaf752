//! Request records captured by the offline queue.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Everything needed to replay a mutating request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
  /// HTTP verb, e.g. "POST"
  pub method: String,
  /// Absolute url, or an endpoint relative to the API base url
  pub url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<Value>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub headers: BTreeMap<String, String>,
}

impl RequestSpec {
  pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
    Self {
      method: method.into(),
      url: url.into(),
      body: None,
      headers: BTreeMap::new(),
    }
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.insert(name.into(), value.into());
    self
  }

  /// Reject requests that could never be replayed.
  pub fn validate(&self) -> Result<()> {
    if self.method.is_empty() || !self.method.chars().all(|c| c.is_ascii_alphabetic()) {
      return Err(eyre!("Invalid HTTP method: {:?}", self.method));
    }
    if self.url.trim().is_empty() {
      return Err(eyre!("Request url must not be empty"));
    }
    Ok(())
  }
}

/// A request waiting in the offline queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
  /// Identifies the entry; ordering is positional, not by id
  pub id: String,
  #[serde(flatten)]
  pub request: RequestSpec,
  pub enqueued_at: DateTime<Utc>,
}

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

impl QueuedRequest {
  /// Stamp a request with a fresh id and the current time.
  pub fn new(request: RequestSpec) -> Self {
    let now = Utc::now();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    Self {
      id: format!("{}-{}", now.timestamp_millis(), seq),
      request,
      enqueued_at: now,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_ids_are_unique() {
    let a = QueuedRequest::new(RequestSpec::new("POST", "/messages"));
    let b = QueuedRequest::new(RequestSpec::new("POST", "/messages"));
    assert_ne!(a.id, b.id);
  }

  #[test]
  fn test_validate() {
    assert!(RequestSpec::new("PUT", "/students/4").validate().is_ok());
    assert!(RequestSpec::new("", "/students/4").validate().is_err());
    assert!(RequestSpec::new("PO ST", "/students/4").validate().is_err());
    assert!(RequestSpec::new("DELETE", "  ").validate().is_err());
  }

  #[test]
  fn test_record_layout() {
    let queued = QueuedRequest::new(
      RequestSpec::new("POST", "/payments")
        .with_body(json!({"amount": 120}))
        .with_header("X-Role", "parent"),
    );
    let value = serde_json::to_value(&queued).unwrap();
    assert_eq!(value["method"], "POST");
    assert_eq!(value["url"], "/payments");
    assert_eq!(value["body"]["amount"], 120);
    assert_eq!(value["headers"]["X-Role"], "parent");

    let back: QueuedRequest = serde_json::from_value(value).unwrap();
    assert_eq!(back, queued);
  }
}
