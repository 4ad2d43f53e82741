//! Destroy command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn destroy_removes_everything() {
  let env = TestEnv::from_fixture("notify.lua");
  env.stackup_cmd().arg("apply").arg(&env.config_path).assert().success();
  assert_eq!(env.cloud_objects(), 7);

  env
    .stackup_cmd()
    .arg("destroy")
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("Destroy complete"));

  assert_eq!(env.cloud_objects(), 0);
  assert!(!env.state_file("notify").exists());
}

#[test]
fn destroy_dry_run_keeps_resources() {
  let env = TestEnv::from_fixture("notify.lua");
  env.stackup_cmd().arg("apply").arg(&env.config_path).assert().success();

  env
    .stackup_cmd()
    .arg("destroy")
    .arg(&env.config_path)
    .arg("--dry-run")
    .assert()
    .success()
    .stdout(predicate::str::contains("7 to delete"));

  assert_eq!(env.cloud_objects(), 7);
  assert!(env.state_file("notify").exists());
}

#[test]
fn destroy_twice_is_harmless() {
  let env = TestEnv::from_fixture("notify.lua");
  env.stackup_cmd().arg("apply").arg(&env.config_path).assert().success();
  env.stackup_cmd().arg("destroy").arg(&env.config_path).assert().success();

  env
    .stackup_cmd()
    .arg("destroy")
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing to destroy"));
}
