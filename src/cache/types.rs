//! Records and result types for the response cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Persisted form of a cached response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
  /// The response body, stored verbatim
  pub payload: Value,
  /// When the entry was written
  pub stored_at: DateTime<Utc>,
  /// Time-to-live in milliseconds. Older records may not carry one.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ttl_ms: Option<i64>,
}

/// A cache hit. Stale payloads are still handed back.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse<T> {
  pub payload: T,
  pub is_stale: bool,
  pub stored_at: DateTime<Utc>,
}

/// Indicates where data returned by the client came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Offline mode - network unavailable, serving cached data
  Offline,
}

impl CacheSource {
  pub fn label(&self) -> &'static str {
    match self {
      Self::Network => "network",
      Self::CacheFresh => "cache",
      Self::Offline => "offline",
    }
  }
}
