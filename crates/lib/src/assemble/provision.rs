//! Provisioning of an application type from a local build layout.
//!
//! A build layout is a directory holding `ApplicationManifest.json` and, per
//! imported service manifest, `<ServiceManifestName>/ServiceManifest.json`
//! next to one directory per package:
//!
//! ```text
//! layout/
//! ├── ApplicationManifest.json
//! └── Web/
//!     ├── ServiceManifest.json
//!     ├── Code/
//!     └── Config/
//! ```
//!
//! Every manifest and package directory is checksummed and compared with
//! what the store already recorded for the same version.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, warn};

use super::{AssembleError, InstanceAssembler, join_all};
use crate::canonical::Canonical;
use crate::consts::{APPLICATION_MANIFEST_FILE, SERVICE_MANIFEST_FILE};
use crate::context::{ApplicationTypeContext, ChecksumConflict, PackageEntity, ServiceManifestEntity};
use crate::deadline::Deadline;
use crate::manifest::{ApplicationManifest, PackageKind, ServiceManifest, ServiceManifestRef};
use crate::progress::{ProgressReporter, ProgressStage, ProgressStatus, StoreProgressSink};
use crate::store::{ArtifactStore, StoreLayout, to_document};
use crate::util::hash::{ContentHash, checksum_of, hash_directory};
use crate::validate::{CaseSensitivity, DuplicateDetector, Location, TypeFlags, ValidationError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionOptions {
  /// Abort with [`AssembleError::ChecksumConflict`] instead of skipping conflicting items.
  pub fail_on_conflict: bool,
  /// Keep the latest status in the store under [`StoreLayout::provision_progress`].
  pub record_progress: bool,
  pub flags: TypeFlags,
}

#[derive(Debug, Clone)]
pub struct ProvisionResult {
  pub context: ApplicationTypeContext,
  /// Store keys written by this call.
  pub uploaded: Vec<String>,
  /// Store keys left alone, because they already existed or conflict.
  pub skipped: Vec<String>,
  pub conflicts: Vec<ChecksumConflict>,
}

/// Forwards provisioning progress to the assembler and, when requested, to the store.
struct Progress<'a> {
  assembler: &'a InstanceAssembler,
  recorder: Option<ProgressReporter>,
}

impl Progress<'_> {
  fn report(&self, stage: ProgressStage, completed: usize, total: usize) {
    self.assembler.report(stage, completed, total);
    if let Some(recorder) = &self.recorder {
      recorder.report(ProgressStatus::new(stage, completed as u64, total as u64));
    }
  }

  /// Make sure the recorded status is the final one, not a dropped intermediate.
  async fn finish(&self, stage: ProgressStage, total: usize) {
    if let Some(recorder) = &self.recorder {
      recorder.flush().await;
      recorder.report(ProgressStatus::new(stage, total as u64, total as u64));
      recorder.flush().await;
    }
  }
}

/// One document the provisioned type wants in the store.
struct Upload {
  key: String,
  document: String,
  conflicting: bool,
}

pub(super) async fn provision(
  assembler: &InstanceAssembler,
  layout_dir: PathBuf,
  options: ProvisionOptions,
  deadline: Deadline,
) -> Result<ProvisionResult, AssembleError> {
  deadline.check("read build layout")?;
  let manifest: ApplicationManifest = read_json(&layout_dir.join(APPLICATION_MANIFEST_FILE)).await?;
  let manifest = manifest.canonicalize();
  let type_name = manifest.application_type_name.clone();
  let type_version = manifest.application_type_version.clone();
  info!(
    application_type = %type_name,
    version = %type_version,
    layout = %layout_dir.display(),
    "provisioning application type"
  );

  let source = StoreLayout::application_manifest(&type_name, &type_version);
  let progress = Progress {
    assembler,
    recorder: options.record_progress.then(|| {
      let key = StoreLayout::provision_progress(&type_name, &type_version);
      ProgressReporter::new(Arc::new(StoreProgressSink::new(Arc::clone(assembler.store()), key, deadline)))
    }),
  };
  let total = manifest.service_manifest_imports.len();
  let names =
    Arc::new(DuplicateDetector::new("ServiceManifest", "Name", CaseSensitivity::Insensitive).in_file(source.clone()));
  let layout_dir = Arc::new(layout_dir);

  progress.report(ProgressStage::Extracting, 0, total);
  let mut join_set = JoinSet::new();
  for (index, import) in manifest.service_manifest_imports.iter().enumerate() {
    let store = Arc::clone(assembler.store());
    let names = Arc::clone(&names);
    let layout_dir = Arc::clone(&layout_dir);
    let type_name = type_name.clone();
    let reference = import.service_manifest_ref.clone();
    join_set.spawn(async move {
      let entity = extract_service_manifest(store, &layout_dir, &type_name, &reference, &names, deadline).await?;
      Ok::<_, AssembleError>((index, entity))
    }
    .in_current_span());
  }
  let mut extracted = join_all(join_set, |done| progress.report(ProgressStage::Extracting, done, total)).await?;
  extracted.sort_by_key(|(index, _)| *index);

  let context = ApplicationTypeContext {
    source,
    manifest,
    service_manifests: extracted.into_iter().map(|(_, entity)| entity).collect(),
  };

  progress.report(ProgressStage::Validating, 0, 1);
  assembler.validators().validate_type(&context, options.flags)?;

  let conflicts = context.checksum_conflicts();
  if !conflicts.is_empty() && options.fail_on_conflict {
    return Err(AssembleError::ChecksumConflict { conflicts });
  }

  deadline.check("upload application type")?;
  let (closure, application_manifest) = uploads(&context)?;
  let (uploaded, skipped) = upload_missing(&progress, closure, application_manifest, deadline).await?;
  progress.finish(ProgressStage::Uploading, uploaded.len() + skipped.len()).await;
  info!(
    application_type = %type_name,
    uploaded = uploaded.len(),
    skipped = skipped.len(),
    conflicts = conflicts.len(),
    "application type provisioned"
  );

  Ok(ProvisionResult {
    context,
    uploaded,
    skipped,
    conflicts,
  })
}

pub(super) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AssembleError> {
  let text = tokio::fs::read_to_string(path).await.map_err(|source| AssembleError::LocalRead {
    path: path.to_path_buf(),
    source,
  })?;
  serde_json::from_str(&text).map_err(|source| AssembleError::LocalParse {
    path: path.to_path_buf(),
    source,
  })
}

async fn extract_service_manifest(
  store: Arc<dyn ArtifactStore>,
  layout_dir: &Path,
  type_name: &str,
  reference: &ServiceManifestRef,
  names: &DuplicateDetector,
  deadline: Deadline,
) -> Result<ServiceManifestEntity, AssembleError> {
  let manifest_dir = layout_dir.join(&reference.name);
  let manifest_path = manifest_dir.join(SERVICE_MANIFEST_FILE);
  let manifest: ServiceManifest = read_json(&manifest_path).await?;
  if manifest.name != reference.name || manifest.version != reference.version {
    return Err(
      ValidationError::InvalidReference {
        at: Location::new("ServiceManifestRef", "ServiceManifestName")
          .file(Some(&*manifest_path.to_string_lossy())),
        value: format!("{}@{}", reference.name, reference.version),
        target: "service manifest with a matching name and version",
      }
      .into(),
    );
  }
  names.add(&manifest.name)?;

  let manifest = manifest.canonicalize();
  let key = StoreLayout::service_manifest(type_name, &manifest.name, &manifest.version);
  let checksum = checksum_of(&manifest).map_err(|source| AssembleError::Checksum {
    item: key.clone(),
    source,
  })?;

  let (recorded, packages) = tokio::try_join!(
    async {
      Ok::<_, AssembleError>(
        store
          .try_get(&StoreLayout::checksum(&key), deadline)
          .await?
          .map(|document| ContentHash::from_recorded(&document)),
      )
    },
    hash_packages(&store, &manifest_dir, type_name, &manifest, deadline),
  )?;

  let conflicting_checksum = conflict(recorded, &checksum, &key);
  let mut entity = ServiceManifestEntity {
    source: key,
    manifest,
    checksum,
    conflicting_checksum,
    code_packages: Vec::new(),
    config_packages: Vec::new(),
    data_packages: Vec::new(),
  };
  for package in packages {
    match package.kind {
      PackageKind::Code => entity.code_packages.push(package),
      PackageKind::Config => entity.config_packages.push(package),
      PackageKind::Data => entity.data_packages.push(package),
    }
  }
  Ok(entity)
}

/// Hash every package directory and compare it with the recorded checksum.
async fn hash_packages(
  store: &Arc<dyn ArtifactStore>,
  manifest_dir: &Path,
  type_name: &str,
  manifest: &ServiceManifest,
  deadline: Deadline,
) -> Result<Vec<PackageEntity>, AssembleError> {
  let mut join_set = JoinSet::new();
  for (index, (kind, package)) in manifest.packages().enumerate() {
    let store = Arc::clone(store);
    let dir = manifest_dir.join(&package.name);
    let key = StoreLayout::package_checksum(type_name, &manifest.name, &package.name, &package.version);
    let package = package.clone();
    join_set.spawn(async move {
      let hash_dir = dir.clone();
      let (computed, recorded) = tokio::try_join!(
        async { Ok::<_, AssembleError>(tokio::task::spawn_blocking(move || hash_directory(&hash_dir)).await??) },
        async { Ok::<_, AssembleError>(store.try_get(&key, deadline).await?) },
      )?;
      debug!(package = %package.name, dir = %dir.display(), checksum = %computed, "hashed package");

      let mut entity = PackageEntity::new(kind, package);
      entity.conflicting_checksum = conflict(recorded.map(|d| ContentHash::from_recorded(&d)), &computed, &key);
      entity.checksum = Some(computed);
      Ok::<_, AssembleError>((index, entity))
    }
    .in_current_span());
  }

  let mut packages = join_all(join_set, |_| {}).await?;
  packages.sort_by_key(|(index, _)| *index);
  Ok(packages.into_iter().map(|(_, entity)| entity).collect())
}

fn conflict(recorded: Option<ContentHash>, computed: &ContentHash, key: &str) -> Option<ContentHash> {
  let recorded = recorded.filter(|recorded| recorded != computed)?;
  warn!(key, recorded = %recorded, computed = %computed, "checksum conflict");
  Some(recorded)
}

/// Documents of the type closure, and the application manifest uploaded after them.
fn uploads(context: &ApplicationTypeContext) -> Result<(Vec<Upload>, Upload), AssembleError> {
  let type_name = context.type_name();
  let mut closure = Vec::new();
  for sm in &context.service_manifests {
    let conflicting = sm.conflicting_checksum.is_some();
    closure.push(Upload {
      key: sm.source.clone(),
      document: to_document(&sm.source, &sm.manifest)?,
      conflicting,
    });
    closure.push(Upload {
      key: StoreLayout::checksum(&sm.source),
      document: sm.checksum.to_string(),
      conflicting,
    });
    for package in sm.packages() {
      if let Some(checksum) = &package.checksum {
        closure.push(Upload {
          key: StoreLayout::package_checksum(
            type_name,
            &sm.manifest.name,
            &package.description.name,
            &package.description.version,
          ),
          document: checksum.to_string(),
          conflicting: package.conflicting_checksum.is_some(),
        });
      }
    }
  }

  let application_manifest = Upload {
    key: context.source.clone(),
    document: to_document(&context.source, &context.manifest)?,
    conflicting: false,
  };
  Ok((closure, application_manifest))
}

/// Put every non-conflicting document the store does not hold yet.
async fn upload_missing(
  progress: &Progress<'_>,
  closure: Vec<Upload>,
  application_manifest: Upload,
  deadline: Deadline,
) -> Result<(Vec<String>, Vec<String>), AssembleError> {
  let total = closure.len() + 1;
  let mut skipped = Vec::new();
  let mut join_set = JoinSet::new();
  let assembler = progress.assembler;

  progress.report(ProgressStage::Uploading, 0, total);
  for upload in closure {
    if upload.conflicting {
      skipped.push(upload.key);
      continue;
    }
    let store = Arc::clone(assembler.store());
    join_set.spawn(async move { Ok::<_, AssembleError>(put_if_missing(store.as_ref(), upload, deadline).await?) });
  }
  let outcomes = join_all(join_set, |done| progress.report(ProgressStage::Uploading, done, total)).await?;

  let mut uploaded = Vec::new();
  for (key, written) in outcomes {
    match written {
      true => uploaded.push(key),
      false => skipped.push(key),
    }
  }
  uploaded.sort();
  skipped.sort();

  match put_if_missing(assembler.store().as_ref(), application_manifest, deadline).await? {
    (key, true) => uploaded.push(key),
    (key, false) => skipped.push(key),
  }
  progress.report(ProgressStage::Uploading, total, total);
  Ok((uploaded, skipped))
}

async fn put_if_missing(
  store: &dyn ArtifactStore,
  upload: Upload,
  deadline: Deadline,
) -> Result<(String, bool), crate::store::StoreError> {
  if store.exists(&upload.key, deadline).await? {
    debug!(key = %upload.key, "already present");
    return Ok((upload.key, false));
  }
  store.put(&upload.key, &upload.document, deadline, false).await?;
  Ok((upload.key, true))
}
