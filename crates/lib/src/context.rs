//! In-memory contexts owned by one assembler invocation.
//!
//! An [`ApplicationTypeContext`] is the fetched closure of an application
//! type; an [`ApplicationInstanceContext`] is the fully resolved instance
//! built from it. Both are immutable once assembly hands them out.

use crate::manifest::{
  ApplicationInstance, ApplicationManifest, ApplicationPackage, ManifestParameter, PackageDescription, PackageKind,
  ServiceManifest, ServicePackage,
};
use crate::params::ResolvedParameters;
use crate::util::hash::ContentHash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationTypeContext {
  /// Where the application manifest was read from.
  pub source: String,
  pub manifest: ApplicationManifest,
  /// One entry per service manifest import, in import order.
  pub service_manifests: Vec<ServiceManifestEntity>,
}

impl ApplicationTypeContext {
  pub fn type_name(&self) -> &str {
    &self.manifest.application_type_name
  }

  pub fn type_version(&self) -> &str {
    &self.manifest.application_type_version
  }

  pub fn declared_parameters(&self) -> &[ManifestParameter] {
    &self.manifest.parameters
  }

  pub fn service_manifest(&self, name: &str) -> Option<&ServiceManifestEntity> {
    self.service_manifests.iter().find(|sm| sm.manifest.name == name)
  }

  /// Every entity whose recorded checksum disagrees with its content.
  pub fn checksum_conflicts(&self) -> Vec<ChecksumConflict> {
    let mut conflicts = Vec::new();
    for sm in &self.service_manifests {
      if let Some(recorded) = &sm.conflicting_checksum {
        conflicts.push(ChecksumConflict {
          item: format!("{}/ServiceManifest@{}", sm.manifest.name, sm.manifest.version),
          recorded: recorded.clone(),
          computed: sm.checksum.clone(),
        });
      }
      for package in sm.packages() {
        if let (Some(recorded), Some(computed)) = (&package.conflicting_checksum, &package.checksum) {
          conflicts.push(ChecksumConflict {
            item: format!(
              "{}/{}:{}@{}",
              sm.manifest.name,
              package.kind.element_name(),
              package.description.name,
              package.description.version
            ),
            recorded: recorded.clone(),
            computed: computed.clone(),
          });
        }
      }
    }
    conflicts
  }
}

/// One fetched service manifest and its packages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceManifestEntity {
  pub source: String,
  pub manifest: ServiceManifest,
  /// Checksum of the canonicalized manifest.
  pub checksum: ContentHash,
  /// Set when a previously recorded checksum for this version disagrees.
  pub conflicting_checksum: Option<ContentHash>,
  pub code_packages: Vec<PackageEntity>,
  pub config_packages: Vec<PackageEntity>,
  pub data_packages: Vec<PackageEntity>,
}

impl ServiceManifestEntity {
  pub fn packages(&self) -> impl Iterator<Item = &PackageEntity> {
    self
      .code_packages
      .iter()
      .chain(self.config_packages.iter())
      .chain(self.data_packages.iter())
  }

  pub fn package(&self, kind: PackageKind, name: &str) -> Option<&PackageEntity> {
    self.packages().find(|p| p.kind == kind && p.description.name == name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntity {
  pub kind: PackageKind,
  pub description: PackageDescription,
  /// Absent when no checksum has been recorded yet.
  pub checksum: Option<ContentHash>,
  pub conflicting_checksum: Option<ContentHash>,
}

impl PackageEntity {
  pub fn new(kind: PackageKind, description: PackageDescription) -> Self {
    Self {
      kind,
      description,
      checksum: None,
      conflicting_checksum: None,
    }
  }
}

/// A recorded checksum that disagrees with the content it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumConflict {
  pub item: String,
  pub recorded: ContentHash,
  pub computed: ContentHash,
}

/// A fully resolved application instance ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInstanceContext {
  pub instance: ApplicationInstance,
  pub application_package: ApplicationPackage,
  /// One per service manifest import, in import order.
  pub service_packages: Vec<ServicePackage>,
  pub parameters: ResolvedParameters,
}

impl ApplicationInstanceContext {
  pub fn service_package(&self, name: &str) -> Option<&ServicePackage> {
    self.service_packages.iter().find(|sp| sp.name == name)
  }
}
