//! Durable queue of mutations that failed for lack of connectivity.
//!
//! The whole queue is one JSON array under a single store key. Replay walks it
//! strictly in FIFO order, one request at a time, so causally related writes
//! (create then update) reach the server in the order they were made.

mod request;

use chrono::{Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub use request::{QueuedRequest, RequestSpec};

use crate::api::Transport;
use crate::store::KeyValueStore;

/// Store key holding the serialized queue.
pub const QUEUE_KEY: &str = "offline_queue";

/// Hours a failed request keeps being retried before it is dropped.
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

/// Outcome counts of one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
  pub success_count: usize,
  /// Every failed attempt, including the ones that expired
  pub failed_count: usize,
  /// Failed attempts dropped for being past the retention window
  pub expired_count: usize,
}

pub struct OfflineQueue<S: KeyValueStore> {
  store: S,
  retention: Duration,
}

impl<S: KeyValueStore> OfflineQueue<S> {
  pub fn new(store: S) -> Self {
    Self {
      store,
      retention: Duration::hours(DEFAULT_RETENTION_HOURS),
    }
  }

  /// Set how long failed requests are retained for retry.
  pub fn with_retention(mut self, retention: Duration) -> Self {
    self.retention = retention;
    self
  }

  /// Append a request to the queue.
  ///
  /// Only a malformed request is an error. If the store itself fails the
  /// request is logged and dropped: queueing is best effort. A record that
  /// no longer decodes is replaced by a fresh queue.
  pub fn add(&self, request: RequestSpec) -> Result<()> {
    request.validate()?;

    let queued = QueuedRequest::new(request);
    let id = queued.id.clone();
    let result = self.read_queue_or_reset().and_then(|mut queue| {
      queue.push(queued);
      self.write_queue(&queue)
    });

    match result {
      Ok(()) => debug!(id, "queued offline request"),
      Err(e) => warn!(id, error = %e, "failed to queue offline request, dropping it"),
    }
    Ok(())
  }

  /// All queued requests in FIFO order. Empty if nothing is stored or the
  /// store can't be read.
  pub fn get_all(&self) -> Vec<QueuedRequest> {
    self.read_queue().unwrap_or_else(|e| {
      warn!(error = %e, "failed to read offline queue");
      Vec::new()
    })
  }

  /// Drop every queued request.
  pub fn clear(&self) {
    if let Err(e) = self.store.remove_item(QUEUE_KEY) {
      warn!(error = %e, "failed to clear offline queue");
    }
  }

  /// Re-send every queued request through `transport`, in order.
  ///
  /// Delivered requests leave the queue. Failed ones stay queued unless they
  /// are older than the retention window, in which case they are dropped.
  /// Requests added while the replay is in flight are kept after the
  /// survivors. A `clear` that lands mid-replay is not seen: the final write
  /// puts the retained failures back.
  pub async fn replay<T: Transport>(&self, transport: &T) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    let snapshot = self.get_all();
    if snapshot.is_empty() {
      return summary;
    }

    let snapshot_ids: HashSet<String> = snapshot.iter().map(|r| r.id.clone()).collect();
    let mut retained = Vec::new();

    for queued in snapshot {
      match transport.send(&queued.request).await {
        Ok(()) => {
          debug!(id = %queued.id, "replayed offline request");
          summary.success_count += 1;
        }
        Err(e) => {
          summary.failed_count += 1;
          let age = Utc::now() - queued.enqueued_at;
          if age < self.retention {
            debug!(id = %queued.id, error = %e, "replay failed, keeping request");
            retained.push(queued);
          } else {
            warn!(id = %queued.id, error = %e, "replay failed, request expired");
            summary.expired_count += 1;
          }
        }
      }
    }

    // Pick up anything queued while we were sending
    match self.read_queue_or_reset() {
      Ok(current) => retained.extend(
        current
          .into_iter()
          .filter(|r| !snapshot_ids.contains(&r.id)),
      ),
      Err(e) => warn!(error = %e, "failed to re-read offline queue after replay"),
    }

    if let Err(e) = self.write_queue(&retained) {
      warn!(error = %e, "failed to persist offline queue after replay");
    }

    info!(
      succeeded = summary.success_count,
      failed = summary.failed_count,
      expired = summary.expired_count,
      remaining = retained.len(),
      "offline queue replayed"
    );
    summary
  }

  fn read_queue(&self) -> Result<Vec<QueuedRequest>> {
    match self.store.get_item(QUEUE_KEY)? {
      Some(raw) => {
        serde_json::from_str(&raw).map_err(|e| eyre!("Corrupt offline queue: {}", e))
      }
      None => Ok(Vec::new()),
    }
  }

  /// Like `read_queue`, but a record that fails to decode counts as empty.
  /// Store errors still propagate.
  fn read_queue_or_reset(&self) -> Result<Vec<QueuedRequest>> {
    let raw = match self.store.get_item(QUEUE_KEY)? {
      Some(raw) => raw,
      None => return Ok(Vec::new()),
    };

    match serde_json::from_str(&raw) {
      Ok(queue) => Ok(queue),
      Err(e) => {
        warn!(error = %e, "offline queue record is corrupt, starting a new queue");
        Ok(Vec::new())
      }
    }
  }

  fn write_queue(&self, queue: &[QueuedRequest]) -> Result<()> {
    let raw = serde_json::to_string(queue)
      .map_err(|e| eyre!("Failed to serialize offline queue: {}", e))?;
    self.store.set_item(QUEUE_KEY, &raw)
  }
}
