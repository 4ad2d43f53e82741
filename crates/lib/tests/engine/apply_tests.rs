//! End-to-end apply and destroy against the memory backend.

use stackup_lib::backend::{BackendAction, Fault};
use stackup_lib::execute::{CancelToken, NodeStatus, execute_plan};
use stackup_lib::plan::{OperationKind, compute_destroy_plan};
use stackup_lib::resource::Value;
use stackup_lib::stack::{Stack, StackBuilder};

use super::common::{Harness, artifact, props};

fn chain() -> Stack {
  let mut b = StackBuilder::new("chain");
  b.bucket("a", Default::default()).unwrap();
  b.bucket("b", props(&[("prev", Value::reference("a", "arn"))])).unwrap();
  b.bucket("c", props(&[("prev", Value::reference("b", "arn"))])).unwrap();
  b.build()
}

fn notify() -> Stack {
  let mut b = StackBuilder::new("notify");
  let state = b.bucket("state", Default::default()).unwrap();
  let artifacts = b.bucket("artifacts", Default::default()).unwrap();
  let notifier = b
    .function(
      "notifier",
      props(&[
        ("artifact", artifact(artifacts.reference("name"), "n.zip")),
        ("state_bucket", state.reference("name")),
      ]),
    )
    .unwrap();
  let deployer = b.user("deployer", Default::default()).unwrap();
  b.grant_read_write(&state, &notifier);
  b.grant_write(&notifier, &deployer);
  b.rule(
    "schedule",
    props(&[("schedule", Value::from("rate(5 minutes)")), ("target", notifier.arn())]),
  )
  .unwrap();
  b.build()
}

#[tokio::test]
async fn second_apply_is_all_noop() {
  let h = Harness::new();

  let first = h.apply(notify()).await;
  assert!(first.is_success());
  assert_eq!(first.applied(), 7);

  let second = h.apply(notify()).await;
  assert!(second.is_success());
  assert_eq!(second.noop(), 7);
  assert_eq!(second.applied(), 0);
  assert_eq!(h.backend.calls().len(), 7);
}

#[tokio::test]
async fn references_resolve_to_backend_attributes() {
  let h = Harness::new();
  h.apply(notify()).await;

  let notifier = h.backend.object("notifier").unwrap();
  assert_eq!(notifier["state_bucket"], Value::from("state"));
  let schedule = h.backend.object("schedule").unwrap();
  assert_eq!(schedule["target"], Value::from("arn:memory:function:::notifier"));

  // State keeps the declared, unresolved form.
  let state = h.state("notify");
  assert_eq!(
    state.get("schedule").unwrap().last_applied_properties["target"],
    Value::reference("notifier", "arn")
  );
}

#[tokio::test]
async fn failure_skips_only_transitive_dependents() {
  let h = Harness::new();
  h.backend.inject("notifier", Fault::Permanent);

  let report = h.apply(notify()).await;
  assert!(!report.is_success());
  assert!(matches!(report.status("notifier"), Some(NodeStatus::Failed(_))));
  for dependent in ["schedule", "notifier-state-policy", "deployer-notifier-policy"] {
    assert_eq!(
      report.status(dependent),
      Some(&NodeStatus::Skipped {
        failed_dependency: "notifier".to_string()
      }),
      "{dependent} should be skipped"
    );
  }
  for independent in ["state", "artifacts", "deployer"] {
    assert_eq!(report.status(independent), Some(&NodeStatus::Applied));
  }

  // The next apply picks up where this one stopped.
  h.backend.clear_faults();
  let retry = h.apply(notify()).await;
  assert!(retry.is_success());
  assert_eq!(retry.applied(), 4);
  assert_eq!(retry.noop(), 3);
}

#[tokio::test]
async fn transient_errors_are_retried() {
  let h = Harness::new();
  h.backend.inject("b", Fault::Transient(2));

  let report = h.apply(chain()).await;
  assert!(report.is_success());
  assert_eq!(report.get("b").unwrap().attempts, 3);
}

#[tokio::test]
async fn destroy_reverses_creation_order() {
  let h = Harness::new();
  h.apply(chain()).await;
  assert_eq!(h.backend.succeeded(BackendAction::Create), vec!["a", "b", "c"]);

  let mut state = h.state("chain");
  let plan = compute_destroy_plan(&state).unwrap();
  assert!(plan.operations.iter().all(|op| op.kind == OperationKind::Delete));

  let report = execute_plan(
    &plan,
    h.backend.clone(),
    &h.store,
    &mut state,
    &h.config,
    &CancelToken::new(),
  )
  .await
  .unwrap();
  assert!(report.is_success());
  assert_eq!(h.backend.succeeded(BackendAction::Delete), vec!["c", "b", "a"]);
  assert!(state.is_empty());
  assert_eq!(h.backend.object_count(), 0);
}

#[tokio::test]
async fn removed_nodes_are_deleted() {
  let h = Harness::new();
  h.apply(chain()).await;

  let mut b = StackBuilder::new("chain");
  b.bucket("a", Default::default()).unwrap();
  let report = h.apply(b.build()).await;

  assert!(report.is_success());
  assert_eq!(report.get("a").unwrap().operation, OperationKind::NoOp);
  assert_eq!(h.backend.succeeded(BackendAction::Delete), vec!["c", "b"]);
  assert_eq!(h.state("chain").resources.len(), 1);
}

fn named_state(name: &str) -> Stack {
  let mut b = StackBuilder::new("rename");
  let state = b.bucket("state", props(&[("name", Value::from(name))])).unwrap();
  b.rule(
    "tick",
    props(&[("schedule", Value::from("rate(5 minutes)")), ("target", state.reference("name"))]),
  )
  .unwrap();
  b.build()
}

#[tokio::test]
async fn renaming_a_referenced_bucket_updates_its_dependents() {
  let h = Harness::new();
  assert!(h.apply(named_state("old-name")).await.is_success());
  assert_eq!(h.backend.object("tick").unwrap()["target"], Value::from("old-name"));

  let report = h.apply(named_state("new-name")).await;
  assert!(report.is_success());
  assert_eq!(report.get("state").unwrap().operation, OperationKind::Update);
  assert_eq!(report.get("tick").unwrap().operation, OperationKind::Update);
  assert_eq!(report.status("tick"), Some(&NodeStatus::Applied));
  assert_eq!(h.backend.object("tick").unwrap()["target"], Value::from("new-name"));
  assert_eq!(h.backend.succeeded(BackendAction::Update), vec!["state", "tick"]);

  let settled = h.apply(named_state("new-name")).await;
  assert_eq!(settled.noop(), 2);
  assert_eq!(h.backend.succeeded(BackendAction::Update).len(), 2);
}
