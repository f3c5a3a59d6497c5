//! Read-only queries: type identity of a build layout and manifest download.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info};

use super::persist::write_file;
use super::provision::read_json;
use super::{AssembleError, InstanceAssembler, join_all, require};
use crate::consts::APPLICATION_MANIFEST_FILE;
use crate::deadline::Deadline;
use crate::manifest::{ApplicationManifest, ManifestParameter, ServiceManifestRef};
use crate::store::{StoreError, StoreLayout};

/// What a build layout declares without provisioning it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationTypeInfo {
  pub type_name: String,
  pub type_version: String,
  pub parameters: Vec<ManifestParameter>,
  pub service_manifests: Vec<ServiceManifestRef>,
}

pub(super) async fn application_type_info(layout_dir: &Path) -> Result<ApplicationTypeInfo, AssembleError> {
  let manifest: ApplicationManifest = read_json(&layout_dir.join(APPLICATION_MANIFEST_FILE)).await?;
  require("application type name", &manifest.application_type_name)?;
  require("application type version", &manifest.application_type_version)?;
  debug!(
    application_type = %manifest.application_type_name,
    version = %manifest.application_type_version,
    layout = %layout_dir.display(),
    "read application type info"
  );

  Ok(ApplicationTypeInfo {
    type_name: manifest.application_type_name,
    type_version: manifest.application_type_version,
    parameters: manifest.parameters,
    service_manifests: manifest
      .service_manifest_imports
      .into_iter()
      .map(|import| import.service_manifest_ref)
      .collect(),
  })
}

/// Copy the application manifest and every imported service manifest below
/// `output_dir`, laid out like the store. Documents are written as stored.
pub(super) async fn download_manifests(
  assembler: &InstanceAssembler,
  type_name: &str,
  type_version: &str,
  output_dir: &Path,
  overwrite: bool,
  deadline: Deadline,
) -> Result<Vec<PathBuf>, AssembleError> {
  let key = StoreLayout::application_manifest(type_name, type_version);
  let document = assembler.store().get(&key, deadline).await?;
  let manifest: ApplicationManifest = serde_json::from_str(&document).map_err(|source| StoreError::Parse {
    key: key.clone(),
    source,
  })?;

  let mut join_set = JoinSet::new();
  for (index, import) in manifest.service_manifest_imports.iter().enumerate() {
    let store = Arc::clone(assembler.store());
    let reference = &import.service_manifest_ref;
    let key = StoreLayout::service_manifest(type_name, &reference.name, &reference.version);
    join_set.spawn(
      async move {
        let document = store.get(&key, deadline).await?;
        Ok::<_, AssembleError>((index, key, document))
      }
      .in_current_span(),
    );
  }
  let mut fetched = join_all(join_set, |_| {}).await?;
  fetched.sort_by_key(|(index, _, _)| *index);

  let mut written = Vec::with_capacity(fetched.len() + 1);
  for (key, document) in std::iter::once((key, document)).chain(fetched.into_iter().map(|(_, k, d)| (k, d))) {
    let path = output_dir.join(&key);
    write_file(&path, &document, overwrite).await?;
    written.push(path);
  }
  info!(
    application_type = type_name,
    version = type_version,
    files = written.len(),
    "downloaded manifests"
  );
  Ok(written)
}
