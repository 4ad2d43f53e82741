//! Synthesis: grant expansion, reference edges and ordering.

use stackup_lib::resource::{Origin, ResourceKind, Value};
use stackup_lib::stack::{ConfigError, StackBuilder, synthesize};

use super::common::{artifact, props};

#[test]
fn bucket_user_grant_expands_to_policy() {
  let mut b = StackBuilder::new("svc");
  let bucket = b.bucket("B", Default::default()).unwrap();
  let user = b.user("U", Default::default()).unwrap();
  b.grant_write(&bucket, &user);

  let synth = synthesize(b.build()).unwrap();
  let ids: Vec<_> = synth.stack.ids().cloned().collect();
  assert_eq!(ids, vec!["B", "U", "U-B-policy"]);

  let policy = synth.stack.get("U-B-policy").unwrap();
  assert_eq!(policy.kind, ResourceKind::Policy);
  assert_eq!(policy.origin, Origin::Grant);
  assert!(policy.depends_on.contains("B"));
  assert!(policy.depends_on.contains("U"));
  assert_eq!(synth.order.last().map(String::as_str), Some("U-B-policy"));
}

#[test]
fn overlapping_grants_merge_into_one_policy() {
  let mut b = StackBuilder::new("svc");
  let bucket = b.bucket("B", Default::default()).unwrap();
  let user = b.user("U", Default::default()).unwrap();
  b.grant_read(&bucket, &user);
  b.grant_write(&bucket, &user);

  let synth = synthesize(b.build()).unwrap();
  let policies: Vec<_> = synth
    .stack
    .nodes
    .iter()
    .filter(|n| n.kind == ResourceKind::Policy)
    .collect();
  assert_eq!(policies.len(), 1);

  let Some(Value::List(statements)) = policies[0].properties.get("statements") else {
    panic!("policy must carry statements");
  };
  assert_eq!(statements.len(), 1);
  let actions = statements[0].as_map().unwrap()["actions"].clone();
  let Value::List(actions) = actions else {
    panic!("actions must be a list");
  };
  assert!(actions.contains(&Value::from("storage:GetObject")));
  assert!(actions.contains(&Value::from("storage:PutObject")));
}

#[test]
fn forward_references_order_the_graph() {
  let mut b = StackBuilder::new("svc");
  b.rule(
    "schedule",
    props(&[("target", Value::reference("notifier", "arn"))]),
  )
  .unwrap();
  b.function(
    "notifier",
    props(&[("artifact", artifact(Value::reference("artifacts", "name"), "n.zip"))]),
  )
  .unwrap();
  b.bucket("artifacts", Default::default()).unwrap();

  let synth = synthesize(b.build()).unwrap();
  assert_eq!(synth.order, vec!["artifacts", "notifier", "schedule"]);
  assert_eq!(synth.waves.len(), 3);
}

#[test]
fn ordering_is_deterministic() {
  let build = || {
    let mut b = StackBuilder::new("svc");
    for id in ["d", "c", "b", "a"] {
      b.bucket(id, Default::default()).unwrap();
    }
    b.user("u", props(&[("home", Value::reference("b", "arn"))])).unwrap();
    synthesize(b.build()).unwrap().order
  };

  let first = build();
  assert_eq!(first, build());
  assert_eq!(first, vec!["d", "c", "b", "a", "u"]);
}

#[test]
fn cycle_names_every_node() {
  let mut b = StackBuilder::new("svc");
  b.bucket("a", props(&[("next", Value::reference("b", "arn"))])).unwrap();
  b.bucket("b", props(&[("next", Value::reference("c", "arn"))])).unwrap();
  b.bucket("c", props(&[("next", Value::reference("a", "arn"))])).unwrap();

  let Err(ConfigError::CyclicDependency { cycle }) = synthesize(b.build()) else {
    panic!("expected a cycle");
  };
  let mut cycle = cycle;
  cycle.sort();
  assert_eq!(cycle, vec!["a", "b", "c"]);
}

#[test]
fn grant_on_unsupported_kind_is_rejected() {
  let mut b = StackBuilder::new("svc");
  let user = b.user("U", Default::default()).unwrap();
  let role = b.role("R", Default::default()).unwrap();
  b.grant_read(&user, &role);

  assert!(matches!(
    synthesize(b.build()),
    Err(ConfigError::UnsupportedGrant { .. })
  ));
}
