//! Upload and local output of an assembled instance.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info};

use super::{AssembleError, InstanceAssembler, join_all};
use crate::context::ApplicationInstanceContext;
use crate::deadline::Deadline;
use crate::progress::ProgressStage;
use crate::store::{ArtifactStore, StoreLayout, to_document};

/// Where an assembled instance goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistOptions {
  /// Upload the documents to the assembler's store.
  pub upload: bool,
  /// Also write the documents below this directory, laid out like the store.
  pub output_dir: Option<PathBuf>,
  /// Replace documents that already exist with different content.
  pub overwrite: bool,
}

impl Default for PersistOptions {
  fn default() -> Self {
    Self {
      upload: true,
      output_dir: None,
      overwrite: false,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistSummary {
  /// Store keys written, packages first and the instance document last.
  pub uploaded: Vec<String>,
  pub written: Vec<PathBuf>,
}

/// The serialized documents of one instance, packages before the instance.
fn documents(context: &ApplicationInstanceContext) -> Result<(Vec<(String, String)>, (String, String)), AssembleError> {
  let instance = &context.instance;
  let type_name = &instance.application_type_name;
  let application_id = &instance.application_id;

  let mut packages = Vec::with_capacity(context.service_packages.len() + 1);
  let key = StoreLayout::application_package(type_name, application_id, context.application_package.rollout_version);
  packages.push((key.clone(), to_document(&key, &context.application_package)?));
  for package in &context.service_packages {
    let key = StoreLayout::service_package(type_name, application_id, &package.name, package.rollout_version);
    packages.push((key.clone(), to_document(&key, package)?));
  }

  let key = StoreLayout::application_instance(type_name, application_id, instance.instance_version);
  let document = to_document(&key, instance)?;
  Ok((packages, (key, document)))
}

pub(super) async fn persist(
  assembler: &InstanceAssembler,
  context: &ApplicationInstanceContext,
  options: &PersistOptions,
  deadline: Deadline,
) -> Result<PersistSummary, AssembleError> {
  let (packages, instance) = documents(context)?;

  let upload = async {
    if !options.upload {
      return Ok(Vec::new());
    }
    upload(assembler, &packages, &instance, options.overwrite, deadline).await
  };
  let write = async {
    match &options.output_dir {
      Some(dir) => write_local(dir, &packages, &instance, options.overwrite).await,
      None => Ok(Vec::new()),
    }
  };

  let (uploaded, written) = tokio::try_join!(upload, write)?;
  info!(
    uploaded = uploaded.len(),
    written = written.len(),
    instance_version = context.instance.instance_version,
    "application instance persisted"
  );
  Ok(PersistSummary { uploaded, written })
}

/// Upload packages concurrently, then the instance that refers to them.
async fn upload(
  assembler: &InstanceAssembler,
  packages: &[(String, String)],
  instance: &(String, String),
  overwrite: bool,
  deadline: Deadline,
) -> Result<Vec<String>, AssembleError> {
  let total = packages.len() + 1;
  assembler.report(ProgressStage::Uploading, 0, total);

  let mut join_set = JoinSet::new();
  for (key, document) in packages.iter().cloned() {
    let store: Arc<dyn ArtifactStore> = Arc::clone(assembler.store());
    join_set.spawn(async move {
      store.put(&key, &document, deadline, overwrite).await?;
      debug!(key = %key, "uploaded");
      Ok::<_, AssembleError>(key)
    }
    .in_current_span());
  }
  let mut uploaded = join_all(join_set, |done| assembler.report(ProgressStage::Uploading, done, total)).await?;
  uploaded.sort();

  let (key, document) = instance;
  assembler.store().put(key, document, deadline, overwrite).await?;
  assembler.report(ProgressStage::Uploading, total, total);
  uploaded.push(key.clone());
  Ok(uploaded)
}

async fn write_local(
  dir: &Path,
  packages: &[(String, String)],
  instance: &(String, String),
  overwrite: bool,
) -> Result<Vec<PathBuf>, AssembleError> {
  let mut written = Vec::with_capacity(packages.len() + 1);
  for (key, document) in packages.iter().chain(std::iter::once(instance)) {
    let path = dir.join(key);
    write_file(&path, document, overwrite).await?;
    written.push(path);
  }
  Ok(written)
}

pub(super) async fn write_file(path: &Path, document: &str, overwrite: bool) -> Result<(), AssembleError> {
  let local_write = |source: std::io::Error| AssembleError::LocalWrite {
    path: path.to_path_buf(),
    source,
  };

  if !overwrite {
    match fs::read_to_string(path).await {
      Ok(existing) if existing == document => return Ok(()),
      Ok(_) => return Err(AssembleError::OutputExists { path: path.to_path_buf() }),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(source) => {
        return Err(AssembleError::LocalRead {
          path: path.to_path_buf(),
          source,
        });
      }
    }
  }
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).await.map_err(local_write)?;
  }
  fs::write(path, document).await.map_err(local_write)
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;
  use crate::error::ErrorKind;

  #[tokio::test]
  async fn local_output_refuses_to_replace_different_files() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("apps/Shop/App1/ApplicationInstance.1.json");

    write_file(&path, "{}", false).await.unwrap();
    write_file(&path, "{}", false).await.unwrap();
    let err = write_file(&path, "{\"a\":1}", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreWriteFailure);

    write_file(&path, "{\"a\":1}", true).await.unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"a\":1}");
  }

  #[tokio::test]
  async fn write_local_writes_instance_last() {
    let temp = TempDir::new().unwrap();
    let packages = vec![("a/Pkg.json".to_string(), "p".to_string())];
    let instance = ("a/Instance.json".to_string(), "i".to_string());

    let written = write_local(temp.path(), &packages, &instance, false).await.unwrap();
    assert_eq!(written.last(), Some(&temp.path().join("a/Instance.json")));
  }
}
