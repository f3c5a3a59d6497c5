//! Deterministic store keys.

use crate::consts::CHECKSUM_SUFFIX;
use crate::version::{ClusterVersion, RolloutVersion};

/// Key functions for every document the builder stores.
///
/// The same identity always maps to the same key.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreLayout;

impl StoreLayout {
  pub fn application_manifest(type_name: &str, type_version: &str) -> String {
    format!("types/{}/{}/ApplicationManifest.json", type_name, type_version)
  }

  pub fn service_manifest(type_name: &str, manifest_name: &str, manifest_version: &str) -> String {
    format!(
      "types/{}/ServiceManifests/{}.{}.json",
      type_name, manifest_name, manifest_version
    )
  }

  pub fn service_manifest_checksum(type_name: &str, manifest_name: &str, manifest_version: &str) -> String {
    Self::checksum(&Self::service_manifest(type_name, manifest_name, manifest_version))
  }

  pub fn package_checksum(type_name: &str, manifest_name: &str, package_name: &str, package_version: &str) -> String {
    format!(
      "types/{}/Packages/{}/{}.{}{}",
      type_name, manifest_name, package_name, package_version, CHECKSUM_SUFFIX
    )
  }

  pub fn application_instance(type_name: &str, application_id: &str, instance_version: u64) -> String {
    format!(
      "apps/{}/{}/ApplicationInstance.{}.json",
      type_name, application_id, instance_version
    )
  }

  pub fn application_package(type_name: &str, application_id: &str, rollout: RolloutVersion) -> String {
    format!("apps/{}/{}/ApplicationPackage.{}.json", type_name, application_id, rollout)
  }

  pub fn service_package(
    type_name: &str,
    application_id: &str,
    service_package: &str,
    rollout: RolloutVersion,
  ) -> String {
    format!(
      "apps/{}/{}/{}.Package.{}.json",
      type_name, application_id, service_package, rollout
    )
  }

  /// Returns `None` for the invalid sentinel, which has no document.
  pub fn cluster_manifest(version: &ClusterVersion) -> Option<String> {
    match version {
      ClusterVersion::Invalid => None,
      ClusterVersion::Known { code, config } => Some(format!("cluster/{}/{}/ClusterManifest.json", code, config)),
    }
  }

  pub fn cluster_upgrade_result(current: &ClusterVersion, target: &ClusterVersion) -> String {
    format!(
      "cluster/upgrades/{}__{}.result",
      current.to_string().replace(':', "_"),
      target.to_string().replace(':', "_")
    )
  }

  pub fn provision_progress(type_name: &str, type_version: &str) -> String {
    format!("types/{}/{}/Progress.json", type_name, type_version)
  }

  /// The checksum sibling of a document key.
  pub fn checksum(key: &str) -> String {
    format!("{}{}", key, CHECKSUM_SUFFIX)
  }
}
