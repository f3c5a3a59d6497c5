//! Cluster upgrade classification over a file-system store.

use std::collections::BTreeMap;

use imagebuilder_lib::ErrorKind;
use imagebuilder_lib::manifest::ClusterManifest;
use imagebuilder_lib::store::{ArtifactStore, FsStore, MemoryStore, StoreLayout, put_json};
use imagebuilder_lib::upgrade::{SettingsCatalog, upgrade_cluster};
use imagebuilder_lib::version::ClusterVersion;
use tempfile::TempDir;

use super::common::deadline;

fn manifest(version: &str, settings: &[(&str, &str, &str)]) -> ClusterManifest {
  let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
  for (section, parameter, value) in settings {
    sections
      .entry(section.to_string())
      .or_default()
      .insert(parameter.to_string(), value.to_string());
  }
  ClusterManifest {
    version: version.into(),
    sections,
  }
}

async fn seed(store: &dyn ArtifactStore, version: &str, settings: &[(&str, &str, &str)]) {
  let parsed: ClusterVersion = version.parse().unwrap();
  let key = StoreLayout::cluster_manifest(&parsed).unwrap();
  let config = parsed.config().unwrap().to_string();
  put_json(store, &key, &manifest(&config, settings), deadline(), false).await.unwrap();
}

#[tokio::test]
async fn dynamic_only_change_is_config_only() {
  let temp = TempDir::new().unwrap();
  let store = FsStore::new(temp.path());
  seed(&store, "7.1.0:v1", &[("Hosting", "ActivationMaxFailureCount", "10")]).await;
  seed(&store, "7.1.0:v2", &[("Hosting", "ActivationMaxFailureCount", "20")]).await;

  let result = upgrade_cluster(&store, &SettingsCatalog::builtin(), "7.1.0:v1", "7.1.0:v2", deadline(), true)
    .await
    .unwrap();
  assert!(result.is_config_only);

  let key = result.result_key.unwrap();
  assert_eq!(store.get(&key, deadline()).await.unwrap(), "7.1.0:v1:7.1.0:v2:true");
}

#[tokio::test]
async fn static_change_needs_a_full_upgrade() {
  let temp = TempDir::new().unwrap();
  let store = FsStore::new(temp.path());
  seed(&store, "7.1.0:v1", &[("FabricNode", "StartApplicationPortRange", "20000")]).await;
  seed(&store, "7.1.0:v2", &[("FabricNode", "StartApplicationPortRange", "30000")]).await;

  let result = upgrade_cluster(&store, &SettingsCatalog::builtin(), "7.1.0:v1", "7.1.0:v2", deadline(), false)
    .await
    .unwrap();
  assert!(!result.is_config_only);
  assert!(result.result_key.is_none());
}

#[tokio::test]
async fn forbidden_change_is_an_invalid_config_upgrade() {
  let temp = TempDir::new().unwrap();
  let store = FsStore::new(temp.path());
  seed(&store, "7.1.0:v1", &[("Setup", "FabricDataRoot", "/data")]).await;
  seed(&store, "7.1.0:v2", &[("Setup", "FabricDataRoot", "/mnt/data")]).await;

  let err = upgrade_cluster(&store, &SettingsCatalog::builtin(), "7.1.0:v1", "7.1.0:v2", deadline(), true)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidConfigUpgrade);
  let message = err.to_string();
  assert!(message.contains("7.1.0:v1") && message.contains("7.1.0:v2"));
}

#[tokio::test]
async fn invalid_current_version_reads_nothing() {
  let store = MemoryStore::new();

  let result = upgrade_cluster(&store, &SettingsCatalog::builtin(), "Invalid", "7.1.0:v2", deadline(), false)
    .await
    .unwrap();
  assert!(!result.is_config_only);
  assert_eq!(store.get_count(), 0);
}

#[tokio::test]
async fn malformed_version_is_rejected() {
  let store = MemoryStore::new();
  let err = upgrade_cluster(&store, &SettingsCatalog::builtin(), "not-a-version", "7.1.0:v2", deadline(), false)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidVersionFormat);
}
