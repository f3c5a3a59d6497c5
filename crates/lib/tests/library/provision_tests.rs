//! Provisioning from a local build layout.

use imagebuilder_lib::ErrorKind;
use imagebuilder_lib::assemble::ProvisionOptions;
use imagebuilder_lib::progress::{ProgressStage, ProgressStatus};
use imagebuilder_lib::store::{MemoryStore, StoreLayout};
use std::sync::Arc;
use tempfile::TempDir;

use super::common::{TYPE_NAME, TYPE_VERSION, assembler, deadline, write_layout};

#[tokio::test]
async fn fresh_type_uploads_manifests_and_checksums() {
  let layout = TempDir::new().unwrap();
  write_layout(layout.path(), "{\"port\": 80}");
  let store = Arc::new(MemoryStore::new());
  let assembler = assembler(&store);

  let result = assembler
    .provision_application_type(layout.path(), ProvisionOptions::default(), deadline())
    .await
    .unwrap();

  assert!(result.conflicts.is_empty());
  assert!(result.skipped.is_empty());
  // application manifest, service manifest and its checksum, two package checksums
  assert_eq!(result.uploaded.len(), 5);
  assert_eq!(
    result.uploaded.last(),
    Some(&StoreLayout::application_manifest(TYPE_NAME, TYPE_VERSION))
  );

  let fetched = assembler
    .build_application_type(TYPE_NAME, TYPE_VERSION, Default::default(), deadline())
    .await
    .unwrap();
  let web = fetched.service_manifest("Web").unwrap();
  assert_eq!(web.checksum, result.context.service_manifests[0].checksum);
  assert!(web.packages().all(|p| p.checksum.is_some()));
}

#[tokio::test]
async fn provisioning_twice_skips_everything() {
  let layout = TempDir::new().unwrap();
  write_layout(layout.path(), "{\"port\": 80}");
  let store = Arc::new(MemoryStore::new());
  let assembler = assembler(&store);

  assembler
    .provision_application_type(layout.path(), ProvisionOptions::default(), deadline())
    .await
    .unwrap();
  let puts = store.put_count();

  let again = assembler
    .provision_application_type(layout.path(), ProvisionOptions::default(), deadline())
    .await
    .unwrap();
  assert!(again.uploaded.is_empty());
  assert_eq!(again.skipped.len(), 5);
  assert_eq!(store.put_count(), puts);
}

#[tokio::test]
async fn changed_package_content_under_same_version_conflicts() {
  let first = TempDir::new().unwrap();
  write_layout(first.path(), "{\"port\": 80}");
  let store = Arc::new(MemoryStore::new());
  let assembler = assembler(&store);
  assembler
    .provision_application_type(first.path(), ProvisionOptions::default(), deadline())
    .await
    .unwrap();

  let changed = TempDir::new().unwrap();
  write_layout(changed.path(), "{\"port\": 81}");

  let strict = ProvisionOptions {
    fail_on_conflict: true,
    ..Default::default()
  };
  let err = assembler
    .provision_application_type(changed.path(), strict, deadline())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::ChecksumConflict);
  assert!(err.to_string().contains("Config"));

  let lenient = assembler
    .provision_application_type(changed.path(), ProvisionOptions::default(), deadline())
    .await
    .unwrap();
  assert_eq!(lenient.conflicts.len(), 1);
  let config_key = StoreLayout::package_checksum(TYPE_NAME, "Web", "Config", "1.0");
  assert!(lenient.skipped.contains(&config_key));
  assert!(lenient.uploaded.is_empty());
}

#[tokio::test]
async fn missing_application_manifest_is_a_read_failure() {
  let layout = TempDir::new().unwrap();
  let store = Arc::new(MemoryStore::new());

  let err = assembler(&store)
    .provision_application_type(layout.path(), ProvisionOptions::default(), deadline())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::StoreReadFailure);
  assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn missing_package_directory_fails_provisioning() {
  let layout = TempDir::new().unwrap();
  write_layout(layout.path(), "{}");
  std::fs::remove_dir_all(layout.path().join("Web/Config")).unwrap();
  let store = Arc::new(MemoryStore::new());

  let err = assembler(&store)
    .provision_application_type(layout.path(), ProvisionOptions::default(), deadline())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::StoreReadFailure);
}

#[tokio::test]
async fn recorded_progress_ends_with_every_upload_accounted_for() {
  let layout = TempDir::new().unwrap();
  write_layout(layout.path(), "{\"port\": 80}");
  let store = Arc::new(MemoryStore::new());
  let options = ProvisionOptions {
    record_progress: true,
    ..Default::default()
  };

  let result = assembler(&store)
    .provision_application_type(layout.path(), options, deadline())
    .await
    .unwrap();

  let key = StoreLayout::provision_progress(TYPE_NAME, TYPE_VERSION);
  assert!(!result.uploaded.contains(&key));
  let status: ProgressStatus = serde_json::from_str(&store.document(&key).unwrap()).unwrap();
  assert_eq!(status, ProgressStatus::new(ProgressStage::Uploading, 5, 5));
}

#[tokio::test]
async fn progress_is_not_recorded_by_default() {
  let layout = TempDir::new().unwrap();
  write_layout(layout.path(), "{\"port\": 80}");
  let store = Arc::new(MemoryStore::new());

  assembler(&store)
    .provision_application_type(layout.path(), ProvisionOptions::default(), deadline())
    .await
    .unwrap();
  assert!(store.document(&StoreLayout::provision_progress(TYPE_NAME, TYPE_VERSION)).is_none());
}
