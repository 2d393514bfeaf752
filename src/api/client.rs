//! Data-access client that wraps the transport with caching and an offline
//! write queue.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{CacheSource, ResponseCache};
use crate::config::Config;
use crate::queue::{OfflineQueue, QueuedRequest, ReplaySummary, RequestSpec};
use crate::store::KeyValueStore;

use super::transport::{ReadTransport, Transport};

/// Data returned by [`SchoolClient::fetch`], with where it came from.
#[derive(Debug, Clone)]
pub struct FetchResult<T> {
  pub data: T,
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

/// What happened to a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
  /// Delivered to the server
  Sent,
  /// Server unreachable, stored for a later sync
  Queued,
}

/// API client with transparent caching and offline write support.
///
/// Reads go through the response cache, writes that fail for lack of
/// connectivity go into the offline queue, and [`SchoolClient::sync`] replays
/// that queue once the network is back.
pub struct SchoolClient<S: KeyValueStore, T> {
  transport: T,
  cache: ResponseCache<Arc<S>>,
  queue: OfflineQueue<Arc<S>>,
}

impl<S, T> SchoolClient<S, T>
where
  S: KeyValueStore,
  T: Transport + ReadTransport,
{
  /// Create a client sharing one store between cache and queue.
  pub fn new(config: &Config, transport: T, store: Arc<S>) -> Result<Self> {
    let cache =
      ResponseCache::new(Arc::clone(&store)).with_default_ttl(config.cache.default_ttl()?);
    let queue = OfflineQueue::new(store).with_retention(config.queue.retention()?);

    Ok(Self {
      transport,
      cache,
      queue,
    })
  }

  /// Read an endpoint, stale-while-revalidate.
  ///
  /// 1. Fresh cache entry: return it without touching the network
  /// 2. Otherwise fetch, and cache the answer
  /// 3. On network failure, fall back to the stale entry (offline mode)
  pub async fn fetch(&self, endpoint: &str, params: Option<&Value>) -> Result<FetchResult<Value>> {
    let cached = self.cache.get::<Value>(endpoint, params);

    if let Some(hit) = &cached {
      if !hit.is_stale {
        return Ok(FetchResult {
          data: hit.payload.clone(),
          source: CacheSource::CacheFresh,
          cached_at: Some(hit.stored_at),
        });
      }
    }

    match self.transport.get_json(endpoint, params).await {
      Ok(data) => {
        self.cache.set(endpoint, params, &data, None);
        Ok(FetchResult {
          data,
          source: CacheSource::Network,
          cached_at: None,
        })
      }
      Err(e) => match cached {
        Some(hit) => {
          warn!(endpoint, error = %e, "fetch failed, serving stale cache");
          Ok(FetchResult {
            data: hit.payload,
            source: CacheSource::Offline,
            cached_at: Some(hit.stored_at),
          })
        }
        None => Err(eyre!("Failed to fetch {}: {}", endpoint, e)),
      },
    }
  }

  /// Send a mutation, queueing it if the server can't be reached.
  ///
  /// HTTP errors from a reachable server are returned, not queued.
  pub async fn mutate(&self, request: RequestSpec) -> Result<MutationOutcome> {
    request.validate()?;

    match self.transport.send(&request).await {
      Ok(()) => Ok(MutationOutcome::Sent),
      Err(e) if e.is_connectivity() => {
        info!(method = %request.method, url = %request.url, "offline, queueing request");
        self.queue.add(request)?;
        Ok(MutationOutcome::Queued)
      }
      Err(e) => Err(eyre!("{} {} failed: {}", request.method, request.url, e)),
    }
  }

  /// Replay queued mutations.
  pub async fn sync(&self) -> ReplaySummary {
    self.queue.replay(&self.transport).await
  }

  pub fn pending(&self) -> Vec<QueuedRequest> {
    self.queue.get_all()
  }

  pub fn clear_cache(&self) {
    self.cache.clear();
  }

  pub fn clear_queue(&self) {
    self.queue.clear();
  }
}
