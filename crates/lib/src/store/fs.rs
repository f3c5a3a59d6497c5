//! File-system store rooted at a directory.

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{ArtifactStore, StoreError};
use crate::deadline::Deadline;

/// Stores each document as a file at `<root>/<key>`.
///
/// Writes go to a temporary sibling first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FsStore {
  root: PathBuf,
}

impl FsStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
    let relative = Path::new(key);
    let valid = !key.is_empty() && relative.components().all(|c| matches!(c, Component::Normal(_)));
    if !valid {
      return Err(StoreError::InvalidKey { key: key.to_string() });
    }
    Ok(self.root.join(relative))
  }
}

#[async_trait]
impl ArtifactStore for FsStore {
  async fn get(&self, key: &str, deadline: Deadline) -> Result<String, StoreError> {
    deadline.check("store get")?;
    let path = self.path_for(key)?;
    tracing::trace!(key, path = %path.display(), "fs store get");

    fs::read_to_string(&path).await.map_err(|source| {
      if source.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound { key: key.to_string() }
      } else {
        StoreError::Read {
          key: key.to_string(),
          source,
        }
      }
    })
  }

  async fn put(&self, key: &str, document: &str, deadline: Deadline, overwrite: bool) -> Result<(), StoreError> {
    deadline.check("store put")?;
    let path = self.path_for(key)?;
    let write_err = |source: io::Error| StoreError::Write {
      key: key.to_string(),
      source,
    };

    if !overwrite {
      match fs::read_to_string(&path).await {
        Ok(existing) if existing == document => return Ok(()),
        Ok(_) => return Err(StoreError::AlreadyExists { key: key.to_string() }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
          return Err(StoreError::Read {
            key: key.to_string(),
            source,
          });
        }
      }
    }

    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

    tracing::trace!(key, path = %path.display(), "fs store put");
    fs::write(&temp_path, document).await.map_err(write_err)?;
    fs::rename(&temp_path, &path).await.map_err(write_err)?;
    Ok(())
  }

  async fn exists(&self, key: &str, deadline: Deadline) -> Result<bool, StoreError> {
    deadline.check("store exists")?;
    let path = self.path_for(key)?;
    fs::try_exists(&path).await.map_err(|source| StoreError::Read {
      key: key.to_string(),
      source,
    })
  }

  async fn delete(&self, key: &str, deadline: Deadline) -> Result<bool, StoreError> {
    deadline.check("store delete")?;
    let path = self.path_for(key)?;
    tracing::trace!(key, path = %path.display(), "fs store delete");
    match fs::remove_file(&path).await {
      Ok(()) => Ok(true),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
      Err(source) => Err(StoreError::Write {
        key: key.to_string(),
        source,
      }),
    }
  }
}
