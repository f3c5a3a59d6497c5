//! Provision and build-type integration tests.

use imagebuilder_lib::store::StoreLayout;
use predicates::prelude::*;

use super::common::{TYPE_NAME, TYPE_VERSION, TestEnv};

#[test]
fn provision_uploads_the_layout() {
  let env = TestEnv::new();

  env
    .ib_cmd()
    .arg("provision")
    .arg(env.layout_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Provisioned ShopType 1.0"))
    .stdout(predicate::str::contains("Uploaded: 5"));

  assert!(env.store_file(&StoreLayout::application_manifest(TYPE_NAME, TYPE_VERSION)).exists());
  assert!(env.store_file(&StoreLayout::service_manifest(TYPE_NAME, "Web", "1.0")).exists());
}

#[test]
fn provision_is_idempotent() {
  let env = TestEnv::new();
  env.provision();

  env
    .ib_cmd()
    .arg("provision")
    .arg(env.layout_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Uploaded: 0"))
    .stdout(predicate::str::contains("Skipped: 5"));
}

#[test]
fn changed_package_content_is_reported() {
  let env = TestEnv::new();
  env.provision();
  env.write_file("Web/Config/Settings.txt", "Port=9090");

  env
    .ib_cmd()
    .arg("provision")
    .arg(env.layout_path())
    .assert()
    .success()
    .stderr(predicate::str::contains("Checksum conflict"));

  env
    .ib_cmd()
    .arg("provision")
    .arg(env.layout_path())
    .arg("--fail-on-conflict")
    .assert()
    .failure()
    .stderr(predicate::str::contains("[ChecksumConflict]"));
}

#[test]
fn provision_missing_layout_fails() {
  let env = TestEnv::new();

  env
    .ib_cmd()
    .arg("provision")
    .arg(env.temp.path().join("nowhere"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("[StoreReadFailure]"));
}

#[test]
fn build_type_after_provision() {
  let env = TestEnv::new();
  env.provision();

  env
    .ib_cmd()
    .args(["build-type", TYPE_NAME, TYPE_VERSION])
    .assert()
    .success()
    .stdout(predicate::str::contains("ShopType"));
}

#[test]
fn build_type_json_lists_service_manifests() {
  let env = TestEnv::new();
  env.provision();

  let output = env
    .ib_cmd()
    .args(["--format", "json", "build-type", TYPE_NAME, TYPE_VERSION])
    .output()
    .unwrap();
  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert!(json.to_string().contains("Web"));
}

#[test]
fn build_type_missing_from_store_fails() {
  let env = TestEnv::new();

  env
    .ib_cmd()
    .args(["build-type", TYPE_NAME, TYPE_VERSION])
    .assert()
    .failure()
    .stderr(predicate::str::contains("[StoreReadFailure]"));
}

#[test]
fn record_progress_leaves_the_final_status_in_the_store() {
  let env = TestEnv::new();

  env
    .ib_cmd()
    .args(["provision", "--record-progress"])
    .arg(env.layout_path())
    .assert()
    .success();

  let path = env.store_file(&StoreLayout::provision_progress(TYPE_NAME, TYPE_VERSION));
  let status: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
  assert_eq!(status["completed"], status["total"]);
}
