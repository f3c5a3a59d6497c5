//! Type info, manifest download, and instance deletion integration tests.

use imagebuilder_lib::store::StoreLayout;
use predicates::prelude::*;

use super::common::{TYPE_NAME, TYPE_VERSION, TestEnv};

const APP_ID: &str = "shop-1";
const APP_NAME: &str = "fabric:/Shop";

#[test]
fn type_info_reads_the_layout_without_a_store() {
  let env = TestEnv::new();

  env
    .ib_cmd()
    .arg("type-info")
    .arg(env.layout_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("ShopType 1.0"))
    .stdout(predicate::str::contains("Service manifest Web"));

  assert!(!env.store_path().exists());
}

#[test]
fn type_info_json_lists_parameters() {
  let env = TestEnv::new();

  let output = env
    .ib_cmd()
    .args(["--format", "json", "type-info"])
    .arg(env.layout_path())
    .output()
    .unwrap();
  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["type_name"], TYPE_NAME);
  assert_eq!(json["parameters"][0]["name"], "Count");
}

#[test]
fn get_manifests_writes_store_layout() {
  let env = TestEnv::new();
  env.provision();

  env
    .ib_cmd()
    .args(["get-manifests", TYPE_NAME, TYPE_VERSION, "--output"])
    .arg(env.output_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Written: 2"));

  assert!(
    env
      .output_path()
      .join(StoreLayout::application_manifest(TYPE_NAME, TYPE_VERSION))
      .exists()
  );
  assert!(
    env
      .output_path()
      .join(StoreLayout::service_manifest(TYPE_NAME, "Web", "1.0"))
      .exists()
  );
}

#[test]
fn get_manifests_of_unknown_type_fails() {
  let env = TestEnv::new();

  env
    .ib_cmd()
    .args(["get-manifests", "Missing", "1.0", "--output"])
    .arg(env.output_path())
    .assert()
    .failure()
    .code(1)
    .stderr(predicate::str::contains("[StoreReadFailure]"));
}

#[test]
fn delete_removes_the_instance_and_its_packages() {
  let env = TestEnv::new();
  env.provision();
  env
    .ib_cmd()
    .args(["create", TYPE_NAME, TYPE_VERSION, APP_ID, APP_NAME])
    .assert()
    .success();

  env
    .ib_cmd()
    .args(["delete", TYPE_NAME, APP_ID, "1"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Deleted shop-1 instance 1"))
    .stdout(predicate::str::contains("Deleted: 3"));

  assert!(!env.store_file(&StoreLayout::application_instance(TYPE_NAME, APP_ID, 1)).exists());
  assert!(
    env
      .store_file(&StoreLayout::application_manifest(TYPE_NAME, TYPE_VERSION))
      .exists()
  );
}

#[test]
fn delete_of_missing_instance_fails() {
  let env = TestEnv::new();
  env.provision();

  env
    .ib_cmd()
    .args(["delete", TYPE_NAME, APP_ID, "1"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("[StoreReadFailure]"));
}
