//! Persistent key-value text store shared by the cache and the offline queue.
//!
//! The store is injected into its consumers rather than reached as a global,
//! so tests can swap in [`MemoryStore`] without touching real device storage.

mod sqlite;

use color_eyre::{eyre::eyre, Result};
use std::collections::BTreeMap;
use std::sync::Mutex;

pub use sqlite::SqliteStore;

/// Trait for key-value storage backends.
///
/// Values are UTF-8 text; consumers serialize their own records.
pub trait KeyValueStore: Send + Sync {
  /// Read a value, `None` if the key was never written.
  fn get_item(&self, key: &str) -> Result<Option<String>>;

  /// Write or overwrite a value.
  fn set_item(&self, key: &str, value: &str) -> Result<()>;

  /// Remove a single key. Removing a missing key is not an error.
  fn remove_item(&self, key: &str) -> Result<()>;

  /// List every key currently stored.
  fn get_all_keys(&self) -> Result<Vec<String>>;

  /// Remove several keys in one batch.
  fn multi_remove(&self, keys: &[String]) -> Result<()>;
}

/// In-memory store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
  items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
    self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

impl KeyValueStore for MemoryStore {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    Ok(self.lock()?.get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    self.lock()?.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    self.lock()?.remove(key);
    Ok(())
  }

  fn get_all_keys(&self) -> Result<Vec<String>> {
    Ok(self.lock()?.keys().cloned().collect())
  }

  fn multi_remove(&self, keys: &[String]) -> Result<()> {
    let mut items = self.lock()?;
    for key in keys {
      items.remove(key);
    }
    Ok(())
  }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    (**self).get_item(key)
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    (**self).set_item(key, value)
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    (**self).remove_item(key)
  }

  fn get_all_keys(&self) -> Result<Vec<String>> {
    (**self).get_all_keys()
  }

  fn multi_remove(&self, keys: &[String]) -> Result<()> {
    (**self).multi_remove(keys)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_memory_store_round_trip() {
    let store = MemoryStore::new();
    assert_eq!(store.get_item("a").unwrap(), None);

    store.set_item("a", "1").unwrap();
    store.set_item("a", "2").unwrap();
    assert_eq!(store.get_item("a").unwrap().as_deref(), Some("2"));

    store.remove_item("a").unwrap();
    store.remove_item("a").unwrap();
    assert_eq!(store.get_item("a").unwrap(), None);
  }

  #[test]
  fn test_memory_store_multi_remove() {
    let store = MemoryStore::new();
    store.set_item("x", "1").unwrap();
    store.set_item("y", "2").unwrap();
    store.set_item("z", "3").unwrap();

    store
      .multi_remove(&["x".to_string(), "z".to_string(), "missing".to_string()])
      .unwrap();
    assert_eq!(store.get_all_keys().unwrap(), vec!["y".to_string()]);
  }
}
