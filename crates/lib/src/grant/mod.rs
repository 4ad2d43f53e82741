//! Permission grants.
//!
//! A [`Grant`] says a principal may read and/or write a resource. Grants are
//! expanded by [`expand_grant`] into a [`PolicyStatement`] whose actions
//! depend on the resource kind, merged per (principal, resource) by
//! [`merge`], and attached to the stack as Policy nodes by [`expand_grants`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::resource::{Origin, Properties, ResourceId, ResourceKind, ResourceNode, Value};
use crate::stack::{ConfigError, Stack};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Access {
  Read,
  Write,
  ReadWrite,
}

impl Access {
  fn reads(self) -> bool {
    matches!(self, Access::Read | Access::ReadWrite)
  }

  fn writes(self) -> bool {
    matches!(self, Access::Write | Access::ReadWrite)
  }
}

impl fmt::Display for Access {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Access::Read => write!(f, "read"),
      Access::Write => write!(f, "write"),
      Access::ReadWrite => write!(f, "read_write"),
    }
  }
}

/// A declaration that `principal` may access `resource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
  pub resource: ResourceId,
  pub principal: ResourceId,
  pub access: Access,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
  Allow,
}

impl fmt::Display for Effect {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Allow")
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
  pub effect: Effect,
  pub actions: BTreeSet<String>,
  pub resource: ResourceId,
}

const BUCKET_READ: &[&str] = &["storage:GetObject", "storage:ListBucket"];
const BUCKET_WRITE: &[&str] = &["storage:PutObject", "storage:DeleteObject"];
const FUNCTION_READ: &[&str] = &["function:GetFunction"];
const FUNCTION_WRITE: &[&str] = &["function:UpdateFunctionCode"];

/// Deterministic id of the Policy node generated for a (principal, resource) pair.
///
/// Ids may contain `-`, so distinct pairs such as (`a-b`, `c`) and (`a`, `b-c`)
/// share an id. [`expand_grants`] rejects that with
/// [`ConfigError::PolicyIdCollision`].
pub fn policy_id(principal: &str, resource: &str) -> ResourceId {
  format!("{principal}-{resource}-policy")
}

/// Expand a single grant into a policy statement.
pub fn expand_grant(grant: &Grant, resource_kind: ResourceKind) -> Result<PolicyStatement, ConfigError> {
  let (read, write) = match resource_kind {
    ResourceKind::Bucket => (BUCKET_READ, BUCKET_WRITE),
    ResourceKind::Function => (FUNCTION_READ, FUNCTION_WRITE),
    other => {
      return Err(ConfigError::UnsupportedGrant {
        node: grant.resource.clone(),
        kind: other,
        reason: "only buckets and functions can be granted on".to_string(),
      });
    }
  };

  let mut actions = BTreeSet::new();
  if grant.access.reads() {
    actions.extend(read.iter().map(|a| a.to_string()));
  }
  if grant.access.writes() {
    actions.extend(write.iter().map(|a| a.to_string()));
  }

  Ok(PolicyStatement {
    effect: Effect::Allow,
    actions,
    resource: grant.resource.clone(),
  })
}

/// Merge statements on the same resource by set union of their actions.
///
/// Returns `None` when `statements` is empty or they target different resources.
pub fn merge(statements: impl IntoIterator<Item = PolicyStatement>) -> Option<PolicyStatement> {
  let mut iter = statements.into_iter();
  let mut merged = iter.next()?;
  for stmt in iter {
    if stmt.resource != merged.resource {
      return None;
    }
    merged.actions.extend(stmt.actions);
  }
  Some(merged)
}

fn policy_properties(principal: &str, statement: &PolicyStatement) -> Properties {
  let mut stmt = BTreeMap::new();
  stmt.insert("effect".to_string(), Value::String(statement.effect.to_string()));
  stmt.insert(
    "actions".to_string(),
    Value::List(statement.actions.iter().cloned().map(Value::String).collect()),
  );
  stmt.insert("resource".to_string(), Value::reference(statement.resource.clone(), "arn"));

  let mut props = Properties::new();
  props.insert("principal".to_string(), Value::reference(principal, "arn"));
  props.insert("statements".to_string(), Value::List(vec![Value::Map(stmt)]));
  props
}

/// Replace the stack's grant-generated Policy nodes with a fresh expansion of
/// its grants, one node per (principal, resource) pair.
pub fn expand_grants(stack: &mut Stack) -> Result<(), ConfigError> {
  stack.nodes.retain(|n| n.origin != Origin::Grant);

  // Group by (principal, resource) keeping first-seen order.
  let mut groups: Vec<((ResourceId, ResourceId), Vec<PolicyStatement>)> = Vec::new();
  for grant in &stack.grants {
    let resource = stack.get(&grant.resource).ok_or_else(|| ConfigError::UnknownReference {
      node: policy_id(&grant.principal, &grant.resource),
      target: grant.resource.clone(),
    })?;
    let principal = stack.get(&grant.principal).ok_or_else(|| ConfigError::UnknownReference {
      node: policy_id(&grant.principal, &grant.resource),
      target: grant.principal.clone(),
    })?;
    if !matches!(
      principal.kind,
      ResourceKind::User | ResourceKind::Role | ResourceKind::Function
    ) {
      return Err(ConfigError::UnsupportedGrant {
        node: principal.id.clone(),
        kind: principal.kind,
        reason: "principals must be users, roles or functions".to_string(),
      });
    }

    let statement = expand_grant(grant, resource.kind)?;
    let key = (grant.principal.clone(), grant.resource.clone());
    match groups.iter_mut().find(|(k, _)| *k == key) {
      Some((_, statements)) => statements.push(statement),
      None => groups.push((key, vec![statement])),
    }
  }

  let mut expanded: BTreeMap<ResourceId, (ResourceId, ResourceId)> = BTreeMap::new();
  for ((principal, resource), statements) in groups {
    let id = policy_id(&principal, &resource);
    if let Some((other_principal, other_resource)) = expanded.get(&id) {
      return Err(ConfigError::PolicyIdCollision {
        id,
        principal,
        resource,
        other_principal: other_principal.clone(),
        other_resource: other_resource.clone(),
      });
    }
    if stack.contains(&id) {
      return Err(ConfigError::DuplicateId(id));
    }
    let Some(statement) = merge(statements) else {
      continue;
    };

    expanded.insert(id.clone(), (principal.clone(), resource.clone()));
    debug!(node = %id, actions = ?statement.actions, "expanded grant");
    let mut node = ResourceNode::new(id, ResourceKind::Policy, policy_properties(&principal, &statement));
    node.origin = Origin::Grant;
    stack.nodes.push(node);
  }

  Ok(())
}
