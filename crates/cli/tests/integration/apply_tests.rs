//! Apply command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn apply_notification_stack() {
  let env = TestEnv::from_fixture("notify.lua");

  env
    .stackup_cmd()
    .arg("apply")
    .arg(&env.config_path)
    .arg("--parallelism")
    .arg("1")
    .assert()
    .success()
    .stdout(predicate::str::contains("Apply complete"))
    .stdout(predicate::str::contains("notifier-state-policy"));

  assert!(env.state_file("notify").exists());
  // 2 buckets, function, user, rule, 2 policies
  assert_eq!(env.cloud_objects(), 7);
}

#[test]
fn apply_is_idempotent() {
  let env = TestEnv::from_fixture("notify.lua");

  env.stackup_cmd().arg("apply").arg(&env.config_path).assert().success();

  env
    .stackup_cmd()
    .arg("apply")
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("No changes"));
  assert_eq!(env.cloud_objects(), 7);
}

#[test]
fn apply_dry_run_changes_nothing() {
  let env = TestEnv::from_fixture("notify.lua");

  env
    .stackup_cmd()
    .arg("apply")
    .arg(&env.config_path)
    .arg("--dry-run")
    .assert()
    .success()
    .stdout(predicate::str::contains("Dry run"));

  assert!(!env.state_file("notify").exists());
  assert_eq!(env.cloud_objects(), 0);
}

#[test]
fn apply_updates_changed_properties() {
  let env = TestEnv::from_fixture("notify.lua");
  env.stackup_cmd().arg("apply").arg(&env.config_path).assert().success();

  let changed = std::fs::read_to_string(&env.config_path)
    .unwrap()
    .replace("rate(5 minutes)", "rate(10 minutes)");
  env.write_file("stack.lua", &changed);

  env
    .stackup_cmd()
    .arg("apply")
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("schedule (rule, update)"));
}

#[test]
fn failed_node_skips_dependents_and_exits_nonzero() {
  let env = TestEnv::from_fixture("failing_rule.lua");

  env
    .stackup_cmd()
    .arg("apply")
    .arg(&env.config_path)
    .arg("--max-attempts")
    .arg("1")
    .assert()
    .failure()
    .stdout(predicate::str::contains("invalid schedule"))
    .stdout(predicate::str::contains("skipped"))
    .stderr(predicate::str::contains("finished with errors"));

  // The independent bucket still made it into state.
  let state = std::fs::read_to_string(env.state_file("failing")).unwrap();
  assert!(state.contains("\"state\""));
  assert!(!state.contains("\"ops\""));
}

#[test]
fn cycle_is_rejected_before_any_effect() {
  let env = TestEnv::from_fixture("cycle.lua");

  env
    .stackup_cmd()
    .arg("apply")
    .arg(&env.config_path)
    .assert()
    .failure()
    .stderr(predicate::str::contains("dependency cycle"));

  assert_eq!(env.cloud_objects(), 0);
  assert!(!env.state_file("cycle").exists());
}

#[test]
fn unknown_reference_is_rejected() {
  let env = TestEnv::from_fixture("unknown_ref.lua");

  env
    .stackup_cmd()
    .arg("apply")
    .arg(&env.config_path)
    .assert()
    .failure()
    .stderr(predicate::str::contains("missing"));
}

#[test]
fn artifact_must_exist_when_artifact_dir_is_set() {
  let env = TestEnv::from_fixture("artifact.lua");
  let artifacts = env.temp.path().join("artifacts");
  std::fs::create_dir_all(&artifacts).unwrap();

  env
    .stackup_cmd()
    .env("STACKUP_ARTIFACT_DIR", &artifacts)
    .arg("apply")
    .arg(&env.config_path)
    .assert()
    .failure()
    .stdout(predicate::str::contains("worker"));

  env.write_file("artifacts/artifacts/worker.zip", "zip bytes");

  env
    .stackup_cmd()
    .env("STACKUP_ARTIFACT_DIR", &artifacts)
    .arg("apply")
    .arg(&env.config_path)
    .assert()
    .success();
}

fn renamed_stack(name: &str) -> String {
  format!(
    r#"
return {{
  name = "rename",
  setup = function(stack)
    local state = stack:bucket("state", {{ name = "{name}" }})
    stack:rule("tick", {{ schedule = "rate(5 minutes)", target = state:ref("name") }})
  end,
}}
"#
  )
}

#[test]
fn renaming_a_bucket_updates_rules_that_reference_it() {
  let env = TestEnv::from_fixture("notify.lua");
  env.write_file("stack.lua", &renamed_stack("old-name"));
  env.stackup_cmd().arg("apply").arg(&env.config_path).assert().success();

  env.write_file("stack.lua", &renamed_stack("new-name"));
  env
    .stackup_cmd()
    .arg("apply")
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("Apply complete"));

  let rules: Vec<String> = std::fs::read_dir(env.cloud_path().join("rule"))
    .unwrap()
    .flatten()
    .map(|entry| std::fs::read_to_string(entry.path()).unwrap())
    .collect();
  assert_eq!(rules.len(), 1);
  assert!(rules[0].contains("new-name"));
  assert!(!rules[0].contains("old-name"));

  env
    .stackup_cmd()
    .arg("apply")
    .arg(&env.config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("No changes"));
}
