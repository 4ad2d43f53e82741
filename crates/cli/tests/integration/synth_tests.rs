//! Synthesize command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn synthesize_orders_dependencies_first() {
  let env = TestEnv::from_fixture("notify.lua");

  let output = env
    .stackup_cmd()
    .arg("synthesize")
    .arg(&env.config_path)
    .arg("--json")
    .output()
    .unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let order: Vec<&str> = json["order"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
  let pos = |id: &str| order.iter().position(|n| *n == id).unwrap();

  assert!(pos("artifacts") < pos("notifier"));
  assert!(pos("state") < pos("notifier"));
  assert!(pos("notifier") < pos("schedule"));
  assert!(pos("deployer") < pos("deployer-notifier-policy"));
  assert_eq!(json["plan"]["operations"].as_array().unwrap().len(), 7);
}

#[test]
fn synthesize_has_no_side_effects() {
  let env = TestEnv::from_fixture("notify.lua");

  env
    .stackup_cmd()
    .arg("synthesize")
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("7 to create"));

  assert!(!env.state_file("notify").exists());
  assert_eq!(env.cloud_objects(), 0);
}

#[test]
fn synthesize_hash_is_stable() {
  let env = TestEnv::from_fixture("notify.lua");
  let hash = || {
    let output = env
      .stackup_cmd()
      .arg("synthesize")
      .arg(&env.config_path)
      .arg("--json")
      .output()
      .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    json["hash"].as_str().unwrap().to_string()
  };

  assert_eq!(hash(), hash());
}

#[test]
fn synthesize_after_apply_shows_no_changes() {
  let env = TestEnv::from_fixture("notify.lua");
  env.stackup_cmd().arg("apply").arg(&env.config_path).assert().success();

  env
    .stackup_cmd()
    .arg("plan")
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("No changes"));
}
