//! End-to-end assembly against an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use imagebuilder_lib::Deadline;
use imagebuilder_lib::ErrorKind;
use imagebuilder_lib::assemble::{CreateApplicationRequest, PersistOptions, UpgradeApplicationRequest};
use imagebuilder_lib::manifest::{ApplicationInstance, ServicePackage};
use imagebuilder_lib::store::{MemoryStore, StoreLayout};
use imagebuilder_lib::version::RolloutVersion;
use tempfile::TempDir;

use super::common::{TYPE_NAME, TYPE_VERSION, assembler, deadline, seeded_store, service_manifest, to_json};

fn create_request(parameters: &[(&str, &str)]) -> CreateApplicationRequest {
  CreateApplicationRequest {
    type_name: TYPE_NAME.into(),
    type_version: TYPE_VERSION.into(),
    application_id: "ShopType_App1".into(),
    application_name: "fabric:/Shop".into(),
    parameters: parameters.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
    ..Default::default()
  }
}

mod create {
  use super::*;

  #[tokio::test]
  async fn declared_default_is_used_when_not_overridden() {
    let store = seeded_store();
    let created = assembler(&store).create_application(create_request(&[]), deadline()).await.unwrap();

    let instance = &created.context.instance;
    assert_eq!(instance.instance_version, 1);
    assert_eq!(instance.parameters.get("Count").map(String::as_str), Some("1"));
    assert_eq!(instance.default_services[0].instance_count.as_deref(), Some("1"));
  }

  #[tokio::test]
  async fn override_replaces_declared_default() {
    let store = seeded_store();
    let created = assembler(&store)
      .create_application(create_request(&[("Count", "5")]), deadline())
      .await
      .unwrap();

    let instance = &created.context.instance;
    assert_eq!(instance.parameters.get("Count").map(String::as_str), Some("5"));
    assert_eq!(instance.default_services[0].instance_count.as_deref(), Some("5"));
  }

  #[tokio::test]
  async fn undeclared_parameter_fails_before_any_write() {
    let store = seeded_store();
    let err = assembler(&store)
      .create_application(create_request(&[("Size", "5")]), deadline())
      .await
      .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UndeclaredParameter);
    assert_eq!(store.put_count(), 0);
  }

  #[tokio::test]
  async fn zero_instance_count_fails_instance_validation() {
    let store = seeded_store();
    let err = assembler(&store)
      .create_application(create_request(&[("Count", "0")]), deadline())
      .await
      .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValueMustBeGreaterThanZero);
    assert_eq!(store.put_count(), 0);
  }

  #[tokio::test]
  async fn documents_are_uploaded_and_rerun_is_idempotent() {
    let store = seeded_store();
    let assembler = assembler(&store);
    let created = assembler.create_application(create_request(&[]), deadline()).await.unwrap();

    let instance_key = StoreLayout::application_instance(TYPE_NAME, "ShopType_App1", 1);
    assert_eq!(created.persisted.uploaded.last(), Some(&instance_key));
    assert_eq!(created.persisted.uploaded.len(), 4);
    let stored: ApplicationInstance = serde_json::from_str(&store.document(&instance_key).unwrap()).unwrap();
    assert_eq!(stored, created.context.instance);

    let again = assembler.create_application(create_request(&[]), deadline()).await.unwrap();
    assert_eq!(again.context, created.context);
  }

  #[tokio::test]
  async fn output_directory_mirrors_store_layout() {
    let store = seeded_store();
    let out = TempDir::new().unwrap();
    let request = CreateApplicationRequest {
      persist: PersistOptions {
        upload: false,
        output_dir: Some(out.path().to_path_buf()),
        overwrite: false,
      },
      ..create_request(&[])
    };

    let created = assembler(&store).create_application(request, deadline()).await.unwrap();
    assert!(created.persisted.uploaded.is_empty());
    assert_eq!(store.put_count(), 0);

    let web_key = StoreLayout::service_package(TYPE_NAME, "ShopType_App1", "Web", RolloutVersion::new(1, 0));
    assert!(out.path().join(web_key).is_file());
  }

  #[tokio::test]
  async fn application_name_must_be_a_fabric_uri() {
    let store = seeded_store();
    let request = CreateApplicationRequest {
      application_name: "Shop".into(),
      ..create_request(&[])
    };
    let err = assembler(&store).create_application(request, deadline()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(store.get_count(), 0);
  }
}

mod validate {
  use super::*;

  #[tokio::test]
  async fn validation_uses_mock_identity_and_writes_nothing() {
    let store = seeded_store();
    let context = assembler(&store)
      .validate_application(TYPE_NAME, TYPE_VERSION, &vec![("Port".into(), "9000".into())], deadline())
      .await
      .unwrap();

    assert_eq!(context.instance.application_name, "fabric:/mock_app_for_validation");
    assert_eq!(store.put_count(), 0);
  }

  #[tokio::test]
  async fn missing_service_manifest_is_a_read_failure() {
    let store = Arc::new(MemoryStore::new());
    let app = super::super::common::application_manifest(TYPE_VERSION, &[("Web", "1.0")]);
    store.insert(StoreLayout::application_manifest(TYPE_NAME, TYPE_VERSION), to_json(&app));

    let err = assembler(&store)
      .build_application_type(TYPE_NAME, TYPE_VERSION, Default::default(), deadline())
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreReadFailure);
  }

  #[tokio::test]
  async fn import_order_is_preserved() {
    let store = seeded_store();
    let context = assembler(&store)
      .build_application_type(TYPE_NAME, TYPE_VERSION, Default::default(), deadline())
      .await
      .unwrap();
    let names: Vec<_> = context.service_manifests.iter().map(|sm| sm.manifest.name.as_str()).collect();
    assert_eq!(names, ["Web", "Api"]);
  }
}

mod deadline {
  use super::*;

  #[tokio::test(start_paused = true)]
  async fn concurrent_fetches_fail_when_one_read_outlives_the_deadline() {
    let store = seeded_store();
    store.delay_reads(
      StoreLayout::service_manifest(TYPE_NAME, "Api", "1.0"),
      Duration::from_secs(60),
    );
    let assembler = assembler(&store);
    let deadline = Deadline::after(Duration::from_secs(10));

    let (first, second) = tokio::join!(
      assembler.build_application_type(TYPE_NAME, TYPE_VERSION, Default::default(), deadline),
      assembler.build_application_type(TYPE_NAME, TYPE_VERSION, Default::default(), deadline),
    );
    assert_eq!(first.unwrap_err().kind(), ErrorKind::DeadlineExceeded);
    assert_eq!(second.unwrap_err().kind(), ErrorKind::DeadlineExceeded);
  }

  #[tokio::test(start_paused = true)]
  async fn expired_deadline_issues_no_reads() {
    let store = seeded_store();
    let deadline = Deadline::after(Duration::from_secs(1));
    tokio::time::advance(Duration::from_secs(2)).await;

    let err = assembler(&store)
      .create_application(create_request(&[]), deadline)
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    assert_eq!(store.get_count(), 0);
  }
}

mod upgrade {
  use super::*;

  /// Type 2.0 moves `Api` to 1.1 and leaves `Web` untouched.
  pub(super) fn seed_v2(store: &MemoryStore) {
    let app = super::super::common::application_manifest("2.0", &[("Web", "1.0"), ("Api", "1.1")]);
    store.insert(StoreLayout::application_manifest(TYPE_NAME, "2.0"), to_json(&app));
    store.insert(StoreLayout::service_manifest(TYPE_NAME, "Api", "1.1"), to_json(&service_manifest("Api", "1.1")));
  }

  pub(super) fn upgrade_request(current_instance_version: u64) -> UpgradeApplicationRequest {
    UpgradeApplicationRequest {
      type_name: TYPE_NAME.into(),
      target_type_version: "2.0".into(),
      application_id: "ShopType_App1".into(),
      application_name: "fabric:/Shop".into(),
      current_instance_version,
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn unchanged_packages_keep_their_rollout_version() {
    let store = seeded_store();
    seed_v2(&store);
    let assembler = assembler(&store);
    assembler.create_application(create_request(&[]), deadline()).await.unwrap();

    let upgraded = assembler.upgrade_application(upgrade_request(1), deadline()).await.unwrap();
    let context = &upgraded.context;
    assert_eq!(context.instance.instance_version, 2);
    assert_eq!(context.instance.application_type_version, "2.0");
    assert_eq!(context.application_package.rollout_version, RolloutVersion::new(1, 0));
    assert_eq!(context.service_package("Web").unwrap().rollout_version, RolloutVersion::new(1, 0));
    assert_eq!(context.service_package("Api").unwrap().rollout_version, RolloutVersion::new(2, 0));

    let api_key = StoreLayout::service_package(TYPE_NAME, "ShopType_App1", "Api", RolloutVersion::new(2, 0));
    let api: ServicePackage = serde_json::from_str(&store.document(&api_key).unwrap()).unwrap();
    assert_eq!(api.manifest_version, "1.1");
  }

  #[tokio::test]
  async fn missing_current_instance_is_a_read_failure() {
    let store = seeded_store();
    seed_v2(&store);
    let err = assembler(&store)
      .upgrade_application(upgrade_request(3), deadline())
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreReadFailure);
  }

  #[tokio::test]
  async fn instance_version_zero_is_rejected() {
    let store = seeded_store();
    let err = assembler(&store)
      .upgrade_application(upgrade_request(0), deadline())
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
  }
}

mod manifests {
  use super::*;

  #[tokio::test]
  async fn stored_manifests_are_copied_in_store_layout() {
    let store = seeded_store();
    let out = TempDir::new().unwrap();

    let written = assembler(&store)
      .get_manifests(TYPE_NAME, TYPE_VERSION, out.path(), false, deadline())
      .await
      .unwrap();
    let app_key = StoreLayout::application_manifest(TYPE_NAME, TYPE_VERSION);
    assert_eq!(written.len(), 3);
    assert_eq!(written[0], out.path().join(&app_key));
    assert_eq!(
      std::fs::read_to_string(&written[0]).unwrap(),
      store.document(&app_key).unwrap()
    );
    assert!(out.path().join(StoreLayout::service_manifest(TYPE_NAME, "Api", "1.0")).is_file());
    assert_eq!(store.put_count(), 0);
  }

  #[tokio::test]
  async fn unknown_type_is_a_read_failure() {
    let store = seeded_store();
    let out = TempDir::new().unwrap();
    let err = assembler(&store)
      .get_manifests(TYPE_NAME, "9.9", out.path(), false, deadline())
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreReadFailure);
  }
}

mod delete {
  use super::upgrade::{seed_v2, upgrade_request};
  use super::*;

  #[tokio::test]
  async fn deleting_the_only_instance_removes_every_document() {
    let store = seeded_store();
    let assembler = assembler(&store);
    let created = assembler.create_application(create_request(&[]), deadline()).await.unwrap();

    let summary = assembler
      .delete_application_instance(TYPE_NAME, "ShopType_App1", 1, deadline())
      .await
      .unwrap();
    assert_eq!(summary.deleted[0], StoreLayout::application_instance(TYPE_NAME, "ShopType_App1", 1));
    assert_eq!(summary.deleted.len(), created.persisted.uploaded.len());
    assert!(summary.retained.is_empty());
    assert!(store.keys().iter().all(|k| !k.starts_with("apps/")));
  }

  #[tokio::test]
  async fn packages_shared_with_the_next_version_are_kept() {
    let store = seeded_store();
    seed_v2(&store);
    let assembler = assembler(&store);
    assembler.create_application(create_request(&[]), deadline()).await.unwrap();
    assembler.upgrade_application(upgrade_request(1), deadline()).await.unwrap();

    let summary = assembler
      .delete_application_instance(TYPE_NAME, "ShopType_App1", 1, deadline())
      .await
      .unwrap();
    let web_key = StoreLayout::service_package(TYPE_NAME, "ShopType_App1", "Web", RolloutVersion::new(1, 0));
    let api_key = StoreLayout::service_package(TYPE_NAME, "ShopType_App1", "Api", RolloutVersion::new(1, 0));
    assert!(summary.retained.contains(&web_key));
    assert!(summary.deleted.contains(&api_key));
    assert!(store.document(&web_key).is_some());
    assert!(store.document(&api_key).is_none());

    // Instance 2 is untouched.
    let instance_2 = StoreLayout::application_instance(TYPE_NAME, "ShopType_App1", 2);
    let stored: ApplicationInstance = serde_json::from_str(&store.document(&instance_2).unwrap()).unwrap();
    assert_eq!(stored.instance_version, 2);
  }

  #[tokio::test]
  async fn missing_instance_is_a_read_failure() {
    let store = seeded_store();
    let err = assembler(&store)
      .delete_application_instance(TYPE_NAME, "ShopType_App1", 4, deadline())
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreReadFailure);
  }
}
