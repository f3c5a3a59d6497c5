//! Create, validate and upgrade integration tests.

use imagebuilder_lib::store::StoreLayout;
use predicates::prelude::*;

use super::common::{TYPE_NAME, TYPE_VERSION, TestEnv};

const APP_ID: &str = "shop-1";
const APP_NAME: &str = "fabric:/Shop";

fn create_args() -> [&'static str; 5] {
  ["create", TYPE_NAME, TYPE_VERSION, APP_ID, APP_NAME]
}

#[test]
fn create_uploads_the_instance() {
  let env = TestEnv::new();
  env.provision();

  env
    .ib_cmd()
    .args(create_args())
    .args(["-p", "Count=3"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Created fabric:/Shop"))
    .stdout(predicate::str::contains("Service package Web"));

  let instance = env.store_file(&StoreLayout::application_instance(TYPE_NAME, APP_ID, 1));
  let document = std::fs::read_to_string(instance).unwrap();
  let json: serde_json::Value = serde_json::from_str(&document).unwrap();
  assert_eq!(json["parameters"]["Count"], "3");
}

#[test]
fn create_json_prints_the_instance() {
  let env = TestEnv::new();
  env.provision();

  let output = env.ib_cmd().args(["--format", "json"]).args(create_args()).output().unwrap();
  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["application_name"], APP_NAME);
  assert_eq!(json["instance_version"], 1);
}

#[test]
fn undeclared_parameter_fails_without_uploading() {
  let env = TestEnv::new();
  env.provision();

  env
    .ib_cmd()
    .args(create_args())
    .args(["-p", "Size=5"])
    .assert()
    .failure()
    .code(1)
    .stderr(predicate::str::contains("[UndeclaredParameter]"));

  let instance = env.store_file(&StoreLayout::application_instance(TYPE_NAME, APP_ID, 1));
  assert!(!instance.exists());
}

#[test]
fn malformed_parameter_is_a_usage_error() {
  let env = TestEnv::new();

  env
    .ib_cmd()
    .args(create_args())
    .args(["-p", "Count"])
    .assert()
    .failure()
    .code(2)
    .stderr(predicate::str::contains("NAME=VALUE"));
}

#[test]
fn create_writes_local_output_without_upload() {
  let env = TestEnv::new();
  env.provision();

  env
    .ib_cmd()
    .args(create_args())
    .arg("--no-upload")
    .arg("--output")
    .arg(env.output_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Written"));

  let key = StoreLayout::application_instance(TYPE_NAME, APP_ID, 1);
  assert!(env.output_path().join(&key).exists());
  assert!(!env.store_file(&key).exists());
}

#[test]
fn validate_prints_resolved_parameters() {
  let env = TestEnv::new();
  env.provision();

  env
    .ib_cmd()
    .args(["validate", TYPE_NAME, TYPE_VERSION, "-p", "Count=4"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Count: 4"));
}

#[test]
fn zero_instance_count_fails_validation() {
  let env = TestEnv::new();
  env.provision();

  env
    .ib_cmd()
    .args(["validate", TYPE_NAME, TYPE_VERSION, "-p", "Count=0"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("[ValueMustBeGreaterThanZero]"));
}

#[test]
fn upgrade_builds_the_next_instance() {
  let env = TestEnv::new();
  env.provision();
  env.ib_cmd().args(create_args()).assert().success();

  env
    .ib_cmd()
    .args(["upgrade", TYPE_NAME, TYPE_VERSION, APP_ID, APP_NAME, "--current", "1", "-p", "Count=2"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Upgraded fabric:/Shop (instance 2"));

  assert!(env.store_file(&StoreLayout::application_instance(TYPE_NAME, APP_ID, 2)).exists());
}

#[test]
fn upgrade_without_current_instance_fails() {
  let env = TestEnv::new();
  env.provision();

  env
    .ib_cmd()
    .args(["upgrade", TYPE_NAME, TYPE_VERSION, APP_ID, APP_NAME, "--current", "1"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("[StoreReadFailure]"));
}
