//! Response cache with lazy staleness detection.

use chrono::{Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::key::{derive_key, is_cache_key};
use super::types::{CacheEntry, CachedResponse};
use crate::store::KeyValueStore;

/// Default seconds before a cached response is reported stale.
pub const DEFAULT_TTL_SECS: i64 = 300;

/// Stores the last successful response per `(endpoint, params)`.
///
/// Every storage failure is absorbed here: reads degrade to a miss and writes
/// are logged and dropped, so the cache can only ever cost performance.
pub struct ResponseCache<S: KeyValueStore> {
  store: S,
  default_ttl: Duration,
}

impl<S: KeyValueStore> ResponseCache<S> {
  /// Create a new cache over the given store.
  pub fn new(store: S) -> Self {
    Self {
      store,
      default_ttl: Duration::seconds(DEFAULT_TTL_SECS),
    }
  }

  /// Set the TTL used when `set` is called without one.
  pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl = ttl;
    self
  }

  /// Look up a cached response. Any storage or decoding failure is a miss.
  pub fn get<T: DeserializeOwned>(
    &self,
    endpoint: &str,
    params: Option<&Value>,
  ) -> Option<CachedResponse<T>> {
    let key = derive_key(endpoint, params);
    match self.read_entry(&key) {
      Ok(Some(hit)) => {
        debug!(endpoint, stale = hit.is_stale, "cache hit");
        Some(hit)
      }
      Ok(None) => {
        debug!(endpoint, "cache miss");
        None
      }
      Err(e) => {
        warn!(endpoint, error = %e, "cache read failed, treating as miss");
        None
      }
    }
  }

  /// Write or replace the cached response. Failures are logged, not returned.
  pub fn set<T: Serialize>(
    &self,
    endpoint: &str,
    params: Option<&Value>,
    payload: &T,
    ttl: Option<Duration>,
  ) {
    let key = derive_key(endpoint, params);
    let ttl = ttl.unwrap_or(self.default_ttl);
    if let Err(e) = self.write_entry(&key, payload, ttl) {
      warn!(endpoint, error = %e, "failed to cache response");
    }
  }

  /// Remove every entry in the cache namespace, leaving other keys alone.
  pub fn clear(&self) {
    if let Err(e) = self.clear_namespace() {
      warn!(error = %e, "failed to clear cache");
    }
  }

  fn read_entry<T: DeserializeOwned>(&self, key: &str) -> Result<Option<CachedResponse<T>>> {
    let raw = match self.store.get_item(key)? {
      Some(raw) => raw,
      None => return Ok(None),
    };

    let entry: CacheEntry =
      serde_json::from_str(&raw).map_err(|e| eyre!("Corrupt cache entry: {}", e))?;
    let ttl = match entry.ttl_ms {
      Some(ms) => Duration::try_milliseconds(ms)
        .ok_or_else(|| eyre!("Corrupt cache entry: ttl out of range"))?,
      None => self.default_ttl,
    };
    let is_stale = Utc::now() - entry.stored_at > ttl;
    let payload: T = serde_json::from_value(entry.payload)
      .map_err(|e| eyre!("Failed to deserialize cached payload: {}", e))?;

    Ok(Some(CachedResponse {
      payload,
      is_stale,
      stored_at: entry.stored_at,
    }))
  }

  fn write_entry<T: Serialize>(&self, key: &str, payload: &T, ttl: Duration) -> Result<()> {
    let entry = CacheEntry {
      payload: serde_json::to_value(payload)
        .map_err(|e| eyre!("Failed to serialize payload: {}", e))?,
      stored_at: Utc::now(),
      ttl_ms: Some(ttl.num_milliseconds()),
    };
    let raw =
      serde_json::to_string(&entry).map_err(|e| eyre!("Failed to serialize entry: {}", e))?;
    self.store.set_item(key, &raw)
  }

  fn clear_namespace(&self) -> Result<()> {
    let keys: Vec<String> = self
      .store
      .get_all_keys()?
      .into_iter()
      .filter(|k| is_cache_key(k))
      .collect();

    if keys.is_empty() {
      return Ok(());
    }

    debug!(count = keys.len(), "clearing cache entries");
    self.store.multi_remove(&keys)
  }
}
