//! Declaring stacks from Lua and applying them.

use std::fs;

use stackup_lib::eval::{EvalError, evaluate_config};
use stackup_lib::execute::NodeStatus;
use stackup_lib::stack::ConfigError;
use tempfile::TempDir;

use super::common::Harness;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
  let path = dir.path().join(name);
  fs::write(&path, content).unwrap();
  path
}

#[tokio::test]
async fn lua_stack_applies_end_to_end() {
  let dir = TempDir::new().unwrap();
  let path = write(
    &dir,
    "stack.lua",
    r#"
      return {
        name = "svc",
        setup = function(stack)
          local b = stack:bucket("B", {})
          local u = stack:user("U", {})
          stack:grant_write(b, u)
        end,
      }
    "#,
  );

  let stack = evaluate_config(&path).unwrap();
  let h = Harness::new();
  let report = h.apply(stack).await;

  assert!(report.is_success());
  let order: Vec<_> = report.nodes.iter().map(|n| n.node_id.as_str()).collect();
  assert_eq!(order, vec!["B", "U", "U-B-policy"]);
  assert_eq!(report.status("U-B-policy"), Some(&NodeStatus::Applied));
}

#[test]
fn helpers_can_be_required_from_the_config_dir() {
  let dir = TempDir::new().unwrap();
  write(
    &dir,
    "buckets.lua",
    r#"
      return function(stack, names)
        for _, name in ipairs(names) do
          stack:bucket(name, {})
        end
      end
    "#,
  );
  let path = write(
    &dir,
    "stack.lua",
    r#"
      local buckets = require("buckets")
      return {
        name = "svc",
        setup = function(stack)
          buckets(stack, { "one", "two" })
        end,
      }
    "#,
  );

  let stack = evaluate_config(&path).unwrap();
  let ids: Vec<_> = stack.ids().cloned().collect();
  assert_eq!(ids, vec!["one", "two"]);
}

#[test]
fn invalid_function_is_a_config_error() {
  let dir = TempDir::new().unwrap();
  let path = write(
    &dir,
    "stack.lua",
    r#"
      return {
        name = "svc",
        setup = function(stack)
          stack:func("worker", { artifact = { bucket = "b" } })
        end,
      }
    "#,
  );

  assert!(matches!(
    evaluate_config(&path),
    Err(EvalError::Config(ConfigError::InvalidProperty { .. }))
  ));
}
