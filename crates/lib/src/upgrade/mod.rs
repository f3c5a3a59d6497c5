//! Cluster upgrade classification.
//!
//! Decides whether moving a cluster from one version to another only changes
//! settings that can be applied without a restart.

mod catalog;

use thiserror::Error;
use tracing::{debug, info};

use crate::deadline::Deadline;
use crate::error::ErrorKind;
use crate::manifest::ClusterManifest;
use crate::store::{ArtifactStore, StoreError, StoreLayout, get_json};
use crate::validate::ValidationError;
use crate::version::{ClusterVersion, VersionError};

pub use catalog::{ChangedSetting, SettingsCatalog, UpgradePolicy};

#[derive(Debug, Error)]
pub enum UpgradeError {
  #[error(transparent)]
  Version(#[from] VersionError),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Validation(#[from] ValidationError),
}

impl UpgradeError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      UpgradeError::Version(e) => e.kind(),
      UpgradeError::Store(e) => e.kind(),
      UpgradeError::Validation(e) => e.kind(),
    }
  }
}

/// Outcome of [`upgrade_cluster`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterUpgradeResult {
  pub current: ClusterVersion,
  pub target: ClusterVersion,
  pub is_config_only: bool,
  /// Key the result document was written to, if one was requested.
  pub result_key: Option<String>,
}

impl ClusterUpgradeResult {
  /// The `current:target:is_config_only` result document.
  pub fn document(&self) -> String {
    format!("{}:{}:{}", self.current, self.target, self.is_config_only)
  }
}

/// Whether upgrading from `current` to `target` changes only dynamic settings.
///
/// An invalid current version has nothing to compare against and yields
/// `false` without touching the store.
pub async fn compute_is_config_only(
  store: &dyn ArtifactStore,
  catalog: &SettingsCatalog,
  current: &ClusterVersion,
  target: &ClusterVersion,
  deadline: Deadline,
) -> Result<bool, UpgradeError> {
  let Some(current_key) = StoreLayout::cluster_manifest(current) else {
    debug!(%target, "current cluster version is invalid, skipping comparison");
    return Ok(false);
  };
  let invalid_upgrade = |reason: String| ValidationError::InvalidConfigUpgrade {
    current_version: current.to_string(),
    target_version: target.to_string(),
    reason,
  };
  let target_key =
    StoreLayout::cluster_manifest(target).ok_or_else(|| invalid_upgrade("the target version is invalid".to_string()))?;

  deadline.check("cluster manifest fetch").map_err(StoreError::from)?;
  let (current_manifest, target_manifest) = tokio::try_join!(
    get_json::<ClusterManifest>(store, &current_key, deadline),
    get_json::<ClusterManifest>(store, &target_key, deadline),
  )?;

  let changed = catalog
    .compare(&current_manifest, &target_manifest)
    .map_err(invalid_upgrade)?;
  debug!(%current, %target, changed = changed.len(), "compared cluster settings");
  Ok(changed.is_empty())
}

/// Classify a cluster upgrade and optionally record the result in the store.
pub async fn upgrade_cluster(
  store: &dyn ArtifactStore,
  catalog: &SettingsCatalog,
  current: &str,
  target: &str,
  deadline: Deadline,
  write_result: bool,
) -> Result<ClusterUpgradeResult, UpgradeError> {
  let current: ClusterVersion = current.parse()?;
  let target: ClusterVersion = target.parse()?;
  info!(%current, %target, "classifying cluster upgrade");

  let is_config_only = compute_is_config_only(store, catalog, &current, &target, deadline).await?;
  let mut result = ClusterUpgradeResult {
    current,
    target,
    is_config_only,
    result_key: None,
  };

  if write_result {
    let key = StoreLayout::cluster_upgrade_result(&result.current, &result.target);
    store.put(&key, &result.document(), deadline, true).await?;
    info!(key = %key, is_config_only, "wrote cluster upgrade result");
    result.result_key = Some(key);
  }
  Ok(result)
}
