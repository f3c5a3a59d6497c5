//! In-memory store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{ArtifactStore, StoreError};
use crate::deadline::Deadline;

/// A mutex-protected map of documents.
///
/// Counts every `get`/`put` call and can delay reads of chosen keys, which
/// makes it the store of choice for tests. A delayed read still honors the
/// caller's deadline.
#[derive(Debug, Default)]
pub struct MemoryStore {
  documents: Mutex<BTreeMap<String, String>>,
  delays: Mutex<HashMap<String, Duration>>,
  gets: AtomicUsize,
  puts: AtomicUsize,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seed a document without counting it as a put.
  pub fn insert(&self, key: impl Into<String>, document: impl Into<String>) {
    self.documents().insert(key.into(), document.into());
  }

  /// Delay every read of `key` by `delay`.
  pub fn delay_reads(&self, key: impl Into<String>, delay: Duration) {
    self.lock_delays().insert(key.into(), delay);
  }

  pub fn document(&self, key: &str) -> Option<String> {
    self.documents().get(key).cloned()
  }

  pub fn keys(&self) -> Vec<String> {
    self.documents().keys().cloned().collect()
  }

  pub fn get_count(&self) -> usize {
    self.gets.load(Ordering::SeqCst)
  }

  pub fn put_count(&self) -> usize {
    self.puts.load(Ordering::SeqCst)
  }

  fn documents(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
    self.documents.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn lock_delays(&self) -> MutexGuard<'_, HashMap<String, Duration>> {
    self.delays.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
  async fn get(&self, key: &str, deadline: Deadline) -> Result<String, StoreError> {
    deadline.check("store get")?;
    self.gets.fetch_add(1, Ordering::SeqCst);
    tracing::trace!(key, "memory store get");

    let delay = self.lock_delays().get(key).copied();
    if let Some(delay) = delay {
      deadline.bound("store get", tokio::time::sleep(delay)).await?;
    }

    self
      .documents()
      .get(key)
      .cloned()
      .ok_or_else(|| StoreError::NotFound { key: key.to_string() })
  }

  async fn put(&self, key: &str, document: &str, deadline: Deadline, overwrite: bool) -> Result<(), StoreError> {
    deadline.check("store put")?;
    self.puts.fetch_add(1, Ordering::SeqCst);
    tracing::trace!(key, overwrite, "memory store put");

    let mut documents = self.documents();
    let existing = documents.get(key).cloned();
    match existing {
      Some(existing) if !overwrite && existing != document => Err(StoreError::AlreadyExists { key: key.to_string() }),
      Some(_) if !overwrite => Ok(()),
      _ => {
        documents.insert(key.to_string(), document.to_string());
        Ok(())
      }
    }
  }

  async fn exists(&self, key: &str, deadline: Deadline) -> Result<bool, StoreError> {
    deadline.check("store exists")?;
    Ok(self.documents().contains_key(key))
  }

  async fn delete(&self, key: &str, deadline: Deadline) -> Result<bool, StoreError> {
    deadline.check("store delete")?;
    tracing::trace!(key, "memory store delete");
    Ok(self.documents().remove(key).is_some())
  }
}
