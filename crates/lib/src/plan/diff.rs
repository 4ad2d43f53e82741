//! Diff computation between a synthesized stack and the applied state.
//!
//! Every id in `desired ∪ applied` gets exactly one [`Operation`]. The
//! operations form their own DAG: creates, updates and no-ops wait for the
//! node's desired dependencies, and a delete waits for every node that
//! depended on the deleted node when it was last applied.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::execute::dag::ExecutionDag;
use crate::execute::resolver::resolve_properties;
use crate::resource::{ResourceId, ResourceKind, ResourceNode};
use crate::stack::{ConfigError, SynthesizedStack};
use crate::state::{AppliedResource, AppliedState};
use crate::util::hash::Hashable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperationKind {
  Create,
  Update,
  Delete,
  NoOp,
}

impl fmt::Display for OperationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OperationKind::Create => write!(f, "create"),
      OperationKind::Update => write!(f, "update"),
      OperationKind::Delete => write!(f, "delete"),
      OperationKind::NoOp => write!(f, "no-op"),
    }
  }
}

/// One planned change to one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
  pub kind: OperationKind,
  pub node_id: ResourceId,
  pub resource_kind: ResourceKind,
  /// The desired node, for everything but deletes.
  pub desired: Option<ResourceNode>,
  /// What the applied state recorded, for updates, deletes and no-ops.
  pub previous: Option<AppliedResource>,
  /// Property names that differ, for updates.
  pub changes: Vec<String>,
}

impl Operation {
  pub fn external_id(&self) -> Option<&str> {
    self.previous.as_ref().map(|p| p.external_id.as_str())
  }
}

/// Counts per operation kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
  pub create: usize,
  pub update: usize,
  pub delete: usize,
  pub noop: usize,
}

impl PlanSummary {
  pub fn changes(&self) -> usize {
    self.create + self.update + self.delete
  }
}

/// An ordered set of operations plus the edges between them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
  pub stack: String,
  /// Operations in execution order for a single worker.
  pub operations: Vec<Operation>,
  /// For each node, the nodes whose operations must finish first.
  pub dependencies: BTreeMap<ResourceId, BTreeSet<ResourceId>>,
}

impl Hashable for Plan {}

impl Plan {
  pub fn get(&self, id: &str) -> Option<&Operation> {
    self.operations.iter().find(|op| op.node_id == id)
  }

  pub fn position(&self, id: &str) -> Option<usize> {
    self.operations.iter().position(|op| op.node_id == id)
  }

  pub fn summary(&self) -> PlanSummary {
    let mut summary = PlanSummary::default();
    for op in &self.operations {
      match op.kind {
        OperationKind::Create => summary.create += 1,
        OperationKind::Update => summary.update += 1,
        OperationKind::Delete => summary.delete += 1,
        OperationKind::NoOp => summary.noop += 1,
      }
    }
    summary
  }

  pub fn has_changes(&self) -> bool {
    self.summary().changes() > 0
  }

  /// The operation DAG, nodes in plan order.
  pub fn dag(&self) -> ExecutionDag {
    ExecutionDag::new(
      self.operations.iter().map(|op| op.node_id.clone()),
      self
        .dependencies
        .iter()
        .flat_map(|(node, deps)| deps.iter().map(move |dep| (node.clone(), dep.clone()))),
    )
  }

  /// Operations grouped into waves that could run concurrently.
  pub fn waves(&self) -> Result<Vec<Vec<ResourceId>>, ConfigError> {
    self.dag().execution_waves()
  }
}

/// Compute the plan that moves `state` to the synthesized stack.
pub fn compute_plan(synth: &SynthesizedStack, state: &AppliedState) -> Result<Plan, ConfigError> {
  let desired: Vec<&ResourceNode> = synth.ordered_nodes().collect();
  let plan = diff(&synth.stack.name, &desired, state)?;

  let summary = plan.summary();
  info!(
    stack = %plan.stack,
    create = summary.create,
    update = summary.update,
    delete = summary.delete,
    noop = summary.noop,
    "computed plan"
  );
  Ok(plan)
}

/// Compute a plan deleting every node in `state`.
pub fn compute_destroy_plan(state: &AppliedState) -> Result<Plan, ConfigError> {
  let plan = diff(&state.stack, &[], state)?;
  info!(stack = %plan.stack, delete = plan.operations.len(), "computed destroy plan");
  Ok(plan)
}

fn diff(stack: &str, desired: &[&ResourceNode], state: &AppliedState) -> Result<Plan, ConfigError> {
  let desired_ids: BTreeSet<&str> = desired.iter().map(|n| n.id.as_str()).collect();
  let mut operations = Vec::new();
  let mut dependencies = BTreeMap::new();

  for node in desired {
    let previous = state.get(&node.id);
    let (kind, changes) = match previous {
      None => (OperationKind::Create, Vec::new()),
      Some(prev) if prev.kind != node.kind => {
        return Err(ConfigError::KindChanged {
          node: node.id.clone(),
          previous: prev.kind,
          current: node.kind,
        });
      }
      Some(prev) => {
        let mut changes = changed_properties(node, prev);
        if changes.is_empty() {
          changes = stale_references(node, prev, state);
        }
        if changes.is_empty() {
          (OperationKind::NoOp, changes)
        } else {
          (OperationKind::Update, changes)
        }
      }
    };

    dependencies.insert(node.id.clone(), node.depends_on.clone());
    operations.push(Operation {
      kind,
      node_id: node.id.clone(),
      resource_kind: node.kind,
      desired: Some((*node).clone()),
      previous: previous.cloned(),
      changes,
    });
  }

  // Deletes follow the reverse of the applied graph's order.
  let applied_dag = ExecutionDag::new(
    state.resources.keys().cloned(),
    state
      .resources
      .iter()
      .flat_map(|(id, r)| r.depends_on.iter().map(move |dep| (id.clone(), dep.clone()))),
  );
  let mut applied_order = applied_dag.topological_order()?;
  applied_order.reverse();

  for id in applied_order.into_iter().filter(|id| !desired_ids.contains(id.as_str())) {
    let Some(previous) = state.get(&id) else {
      continue;
    };
    let waits_for: BTreeSet<ResourceId> = state.dependents_of(&id).into_iter().cloned().collect();
    dependencies.insert(id.clone(), waits_for);
    operations.push(Operation {
      kind: OperationKind::Delete,
      node_id: id,
      resource_kind: previous.kind,
      desired: None,
      previous: Some(previous.clone()),
      changes: Vec::new(),
    });
  }

  let op_dag = ExecutionDag::new(
    operations.iter().map(|op| op.node_id.clone()),
    dependencies
      .iter()
      .flat_map(|(node, deps)| deps.iter().map(move |dep| (node.clone(), dep.clone()))),
  );
  let order = op_dag.topological_order()?;

  let mut by_id: BTreeMap<ResourceId, Operation> = operations.into_iter().map(|op| (op.node_id.clone(), op)).collect();
  let operations = order.iter().filter_map(|id| by_id.remove(id)).collect();

  Ok(Plan {
    stack: stack.to_string(),
    operations,
    dependencies,
  })
}

fn changed_properties(node: &ResourceNode, previous: &AppliedResource) -> Vec<String> {
  let keys: BTreeSet<&String> = node
    .properties
    .keys()
    .chain(previous.last_applied_properties.keys())
    .collect();

  let mut changes: Vec<String> = keys
    .into_iter()
    .filter(|k| node.properties.get(*k) != previous.last_applied_properties.get(*k))
    .cloned()
    .collect();

  if node.depends_on != previous.depends_on {
    changes.push("depends_on".to_string());
  }
  changes
}

/// Properties whose references now resolve to something other than what
/// the backend last received. Unresolvable references are left to apply time.
fn stale_references(node: &ResourceNode, previous: &AppliedResource, state: &AppliedState) -> Vec<String> {
  let Ok(resolved) = resolve_properties(&node.properties, state) else {
    return Vec::new();
  };
  resolved
    .iter()
    .filter(|(k, v)| previous.last_resolved_properties.get(*k) != Some(*v))
    .map(|(k, _)| k.clone())
    .collect()
}
