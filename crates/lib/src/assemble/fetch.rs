//! Concurrent fetch of an application type closure.
//!
//! The application manifest is fetched first. Each imported service manifest
//! is then fetched in its own task together with its recorded checksum, and
//! each of its packages' recorded checksums in a nested fan-out. Every fetch
//! shares the caller's deadline.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, trace, warn};

use super::{AssembleError, InstanceAssembler, join_all};
use crate::canonical::Canonical;
use crate::context::{ApplicationTypeContext, PackageEntity, ServiceManifestEntity};
use crate::deadline::Deadline;
use crate::manifest::{ApplicationManifest, PackageKind, ServiceManifest, ServiceManifestRef};
use crate::progress::ProgressStage;
use crate::store::{ArtifactStore, StoreLayout, get_json};
use crate::util::hash::{ContentHash, checksum_of};
use crate::validate::{CaseSensitivity, DuplicateDetector, Location, ValidationError};

pub(super) async fn fetch_type_closure(
  assembler: &InstanceAssembler,
  type_name: &str,
  type_version: &str,
  deadline: Deadline,
) -> Result<ApplicationTypeContext, AssembleError> {
  deadline.check("fetch application manifest")?;
  let source = StoreLayout::application_manifest(type_name, type_version);
  info!(application_type = type_name, version = type_version, "fetching application type closure");

  let manifest: ApplicationManifest = get_json(assembler.store.as_ref(), &source, deadline).await?;
  if manifest.application_type_name != type_name || manifest.application_type_version != type_version {
    return Err(AssembleError::InvalidArgument {
      argument: "application manifest",
      reason: format!(
        "{} declares {}@{}",
        source, manifest.application_type_name, manifest.application_type_version
      ),
    });
  }
  let manifest = manifest.canonicalize();

  let total = manifest.service_manifest_imports.len();
  let manifest_names = Arc::new(
    DuplicateDetector::new("ServiceManifest", "Name", CaseSensitivity::Insensitive).in_file(source.clone()),
  );
  let mut join_set = JoinSet::new();
  for (index, import) in manifest.service_manifest_imports.iter().enumerate() {
    let store = Arc::clone(&assembler.store);
    let names = Arc::clone(&manifest_names);
    let type_name = type_name.to_string();
    let reference = import.service_manifest_ref.clone();
    join_set.spawn(async move {
      let entity = fetch_service_manifest(store, &type_name, &reference, &names, deadline).await?;
      Ok::<_, AssembleError>((index, entity))
    }
    .in_current_span());
  }

  assembler.report(ProgressStage::Downloading, 0, total);
  let mut fetched = join_all(join_set, |completed| {
    assembler.report(ProgressStage::Downloading, completed, total)
  })
  .await?;
  deadline.check("assemble application type")?;

  fetched.sort_by_key(|(index, _)| *index);
  let service_manifests: Vec<_> = fetched.into_iter().map(|(_, entity)| entity).collect();
  debug!(
    application_type = type_name,
    service_manifests = service_manifests.len(),
    "fetched application type closure"
  );

  Ok(ApplicationTypeContext {
    source,
    manifest,
    service_manifests,
  })
}

async fn fetch_service_manifest(
  store: Arc<dyn ArtifactStore>,
  type_name: &str,
  reference: &ServiceManifestRef,
  names: &DuplicateDetector,
  deadline: Deadline,
) -> Result<ServiceManifestEntity, AssembleError> {
  let key = StoreLayout::service_manifest(type_name, &reference.name, &reference.version);
  let checksum_key = StoreLayout::checksum(&key);
  debug!(service_manifest = %reference.name, key = %key, "fetching service manifest");

  let (manifest, recorded) = tokio::try_join!(
    get_json::<ServiceManifest>(store.as_ref(), &key, deadline),
    store.try_get(&checksum_key, deadline),
  )?;
  if manifest.name != reference.name || manifest.version != reference.version {
    return Err(
      ValidationError::InvalidReference {
        at: Location::new("ServiceManifestRef", "ServiceManifestName").file(Some(key.as_str())),
        value: format!("{}@{}", reference.name, reference.version),
        target: "service manifest with a matching name and version",
      }
      .into(),
    );
  }
  names.add(&manifest.name)?;

  let manifest = manifest.canonicalize();
  let checksum = checksum_of(&manifest).map_err(|source| AssembleError::Checksum {
    item: key.clone(),
    source,
  })?;
  let conflicting_checksum = recorded
    .map(|document| ContentHash::from_recorded(&document))
    .filter(|recorded| *recorded != checksum);
  if let Some(recorded) = &conflicting_checksum {
    warn!(
      service_manifest = %manifest.name,
      recorded = %recorded,
      computed = %checksum,
      "service manifest checksum conflict"
    );
  }

  let packages = fetch_package_checksums(&store, type_name, &manifest, deadline).await?;
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

/// Recorded checksums of every package, in manifest order. Missing checksums are `None`.
async fn fetch_package_checksums(
  store: &Arc<dyn ArtifactStore>,
  type_name: &str,
  manifest: &ServiceManifest,
  deadline: Deadline,
) -> Result<Vec<PackageEntity>, AssembleError> {
  let mut join_set = JoinSet::new();
  for (index, (kind, package)) in manifest.packages().enumerate() {
    let store = Arc::clone(store);
    let key = StoreLayout::package_checksum(type_name, &manifest.name, &package.name, &package.version);
    let package = package.clone();
    join_set.spawn(async move {
      let recorded = store.try_get(&key, deadline).await?;
      trace!(key = %key, found = recorded.is_some(), "package checksum lookup");
      let mut entity = PackageEntity::new(kind, package);
      entity.checksum = recorded.map(|document| ContentHash::from_recorded(&document));
      Ok::<_, AssembleError>((index, entity))
    }
    .in_current_span());
  }

  let mut packages = join_all(join_set, |_| {}).await?;
  packages.sort_by_key(|(index, _)| *index);
  Ok(packages.into_iter().map(|(_, entity)| entity).collect())
}
