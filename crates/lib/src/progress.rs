//! Best-effort progress reporting.
//!
//! A [`ProgressReporter`] forwards coarse status updates to a [`ProgressSink`].
//! At most one write is in flight; an update arriving while a write is still
//! running is dropped rather than queued, so the sink always ends up with a
//! recent status but not necessarily every status.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::deadline::Deadline;
use crate::store::{ArtifactStore, StoreError, put_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressStage {
  Downloading,
  Extracting,
  Validating,
  Uploading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressStatus {
  pub stage: ProgressStage,
  pub completed: u64,
  pub total: u64,
}

impl ProgressStatus {
  pub fn new(stage: ProgressStage, completed: u64, total: u64) -> Self {
    Self { stage, completed, total }
  }
}

impl fmt::Display for ProgressStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?} {}/{}", self.stage, self.completed, self.total)
  }
}

/// Destination of progress updates.
#[async_trait]
pub trait ProgressSink: Send + Sync {
  async fn write(&self, status: ProgressStatus) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct ProgressReporter {
  sink: Arc<dyn ProgressSink>,
  in_flight: Arc<Mutex<()>>,
}

impl fmt::Debug for ProgressReporter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ProgressReporter").finish_non_exhaustive()
  }
}

impl ProgressReporter {
  pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
    Self {
      sink,
      in_flight: Arc::new(Mutex::new(())),
    }
  }

  /// Start writing `status` unless a write is already in flight.
  ///
  /// Returns whether the status was dispatched. Must be called from within a
  /// tokio runtime.
  pub fn report(&self, status: ProgressStatus) -> bool {
    let Ok(guard) = self.in_flight.clone().try_lock_owned() else {
      tracing::trace!(%status, "progress write in flight, dropping status");
      return false;
    };
    let sink = Arc::clone(&self.sink);
    tokio::spawn(async move {
      if let Err(e) = sink.write(status).await {
        tracing::warn!(%status, error = %e, "failed to write progress");
      }
      drop(guard);
    });
    true
  }

  /// Wait until no write is in flight.
  pub async fn flush(&self) {
    let _ = self.in_flight.lock().await;
  }
}

/// Writes each status as a JSON document to one store key.
pub struct StoreProgressSink {
  store: Arc<dyn ArtifactStore>,
  key: String,
  deadline: Deadline,
}

impl StoreProgressSink {
  pub fn new(store: Arc<dyn ArtifactStore>, key: impl Into<String>, deadline: Deadline) -> Self {
    Self {
      store,
      key: key.into(),
      deadline,
    }
  }
}

#[async_trait]
impl ProgressSink for StoreProgressSink {
  async fn write(&self, status: ProgressStatus) -> Result<(), StoreError> {
    put_json(self.store.as_ref(), &self.key, &status, self.deadline, true).await
  }
}
