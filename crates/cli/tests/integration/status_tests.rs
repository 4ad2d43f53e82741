//! Status command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn status_lists_applied_resources() {
  let env = TestEnv::from_fixture("notify.lua");
  env.stackup_cmd().arg("apply").arg(&env.config_path).assert().success();

  env
    .stackup_cmd()
    .arg("status")
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("Resources: 7"))
    .stdout(predicate::str::contains("arn:local:rule:::schedule"));
}

#[test]
fn status_json_is_the_state_document() {
  let env = TestEnv::from_fixture("notify.lua");
  env.stackup_cmd().arg("apply").arg(&env.config_path).assert().success();

  let output = env
    .stackup_cmd()
    .arg("status")
    .arg(&env.config_path)
    .arg("--json")
    .output()
    .unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["stack"], "notify");
  assert_eq!(json["resources"]["notifier"]["kind"], "function");
  assert!(json["resources"]["deployer-notifier-policy"].is_object());
}

#[test]
fn status_reads_explicit_state_file() {
  let env = TestEnv::from_fixture("notify.lua");
  let state = env.temp.path().join("custom-state.json");
  env
    .stackup_cmd()
    .arg("apply")
    .arg(&env.config_path)
    .arg("--state")
    .arg(&state)
    .assert()
    .success();
  assert!(state.exists());
  assert!(!env.state_file("notify").exists());

  env
    .stackup_cmd()
    .arg("status")
    .arg("--state")
    .arg(&state)
    .assert()
    .success()
    .stdout(predicate::str::contains("Stack: notify"));
}
