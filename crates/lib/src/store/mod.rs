//! Key/document store consumed by the builder.
//!
//! Every document the builder reads or writes goes through [`ArtifactStore`].
//! Keys come from [`StoreLayout`]; documents are JSON text.
//!
//! # Layout
//!
//! ```text
//! types/<type>/<version>/ApplicationManifest.json
//! types/<type>/ServiceManifests/<name>.<version>.json[.checksum]
//! types/<type>/Packages/<manifest>/<package>.<version>.checksum
//! apps/<type>/<app id>/ApplicationInstance.<n>.json
//! apps/<type>/<app id>/ApplicationPackage.<rollout>.json
//! apps/<type>/<app id>/<service package>.Package.<rollout>.json
//! cluster/<code>/<config>/ClusterManifest.json
//! ```

mod fs;
mod layout;
mod memory;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::deadline::{Deadline, DeadlineExceeded};
use crate::error::ErrorKind;

pub use fs::FsStore;
pub use layout::StoreLayout;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("no document at '{key}'")]
  NotFound { key: String },

  #[error("failed to read '{key}': {source}")]
  Read {
    key: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write '{key}': {source}")]
  Write {
    key: String,
    #[source]
    source: std::io::Error,
  },

  /// A different document is already stored under the key and overwrite was not requested.
  #[error("a different document already exists at '{key}'")]
  AlreadyExists { key: String },

  #[error("document at '{key}' is not valid: {source}")]
  Parse {
    key: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize document for '{key}': {source}")]
  Serialize {
    key: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("'{key}' is not a valid store key")]
  InvalidKey { key: String },

  #[error(transparent)]
  Deadline(#[from] DeadlineExceeded),
}

impl StoreError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      StoreError::NotFound { .. } | StoreError::Read { .. } | StoreError::Parse { .. } => ErrorKind::StoreReadFailure,
      StoreError::Write { .. } | StoreError::AlreadyExists { .. } | StoreError::Serialize { .. } => {
        ErrorKind::StoreWriteFailure
      }
      StoreError::InvalidKey { .. } => ErrorKind::InvalidArgument,
      StoreError::Deadline(_) => ErrorKind::DeadlineExceeded,
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, StoreError::NotFound { .. })
  }
}

/// Remote key/document storage.
///
/// Every operation checks `deadline` before starting. An operation already
/// in flight is allowed to complete after the deadline passes.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
  async fn get(&self, key: &str, deadline: Deadline) -> Result<String, StoreError>;

  /// Like [`ArtifactStore::get`], with a missing document reported as `None`.
  async fn try_get(&self, key: &str, deadline: Deadline) -> Result<Option<String>, StoreError> {
    match self.get(key, deadline).await {
      Ok(document) => Ok(Some(document)),
      Err(e) if e.is_not_found() => Ok(None),
      Err(e) => Err(e),
    }
  }

  /// Store `document` at `key`.
  ///
  /// Without `overwrite`, an existing document is accepted only if it is
  /// byte-identical; anything else fails with [`StoreError::AlreadyExists`].
  async fn put(&self, key: &str, document: &str, deadline: Deadline, overwrite: bool) -> Result<(), StoreError>;

  async fn exists(&self, key: &str, deadline: Deadline) -> Result<bool, StoreError>;

  /// Remove the document at `key`. Returns whether there was one.
  async fn delete(&self, key: &str, deadline: Deadline) -> Result<bool, StoreError>;
}

pub async fn get_json<T: DeserializeOwned>(
  store: &dyn ArtifactStore,
  key: &str,
  deadline: Deadline,
) -> Result<T, StoreError> {
  let document = store.get(key, deadline).await?;
  parse(key, &document)
}

pub async fn try_get_json<T: DeserializeOwned>(
  store: &dyn ArtifactStore,
  key: &str,
  deadline: Deadline,
) -> Result<Option<T>, StoreError> {
  match store.try_get(key, deadline).await? {
    Some(document) => parse(key, &document).map(Some),
    None => Ok(None),
  }
}

pub async fn put_json<T: Serialize + ?Sized>(
  store: &dyn ArtifactStore,
  key: &str,
  value: &T,
  deadline: Deadline,
  overwrite: bool,
) -> Result<(), StoreError> {
  let document = to_document(key, value)?;
  store.put(key, &document, deadline, overwrite).await
}

/// Serialize a value to the document form stored under `key`.
pub fn to_document<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<String, StoreError> {
  serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
    key: key.to_string(),
    source,
  })
}

fn parse<T: DeserializeOwned>(key: &str, document: &str) -> Result<T, StoreError> {
  serde_json::from_str(document).map_err(|source| StoreError::Parse {
    key: key.to_string(),
    source,
  })
}
