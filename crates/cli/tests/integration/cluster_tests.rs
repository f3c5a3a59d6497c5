//! Cluster upgrade classification tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn invalid_current_version_requires_full_upgrade() {
  let env = TestEnv::new();

  env
    .ib_cmd()
    .args(["cluster-upgrade", "Invalid", "7.1.0:v1"])
    .assert()
    .success()
    .stdout(predicate::str::contains("requires a full upgrade"));
}

#[test]
fn result_document_is_written_on_request() {
  let env = TestEnv::new();

  env
    .ib_cmd()
    .args(["cluster-upgrade", "Invalid", "7.1.0:v1", "--write-result"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Result"));

  let result = env.store_file("cluster/upgrades/Invalid__7.1.0_v1.result");
  assert_eq!(std::fs::read_to_string(result).unwrap(), "Invalid:7.1.0:v1:false");
}

#[test]
fn malformed_version_fails() {
  let env = TestEnv::new();

  env
    .ib_cmd()
    .args(["cluster-upgrade", "seven", "7.1.0:v1"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("[InvalidVersionFormat]"));
}

#[test]
fn missing_cluster_manifests_fail() {
  let env = TestEnv::new();

  env
    .ib_cmd()
    .args(["cluster-upgrade", "7.0.0:v1", "7.1.0:v1"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("[StoreReadFailure]"));
}
