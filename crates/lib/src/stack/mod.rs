//! Stack declaration and synthesis.
//!
//! A [`StackBuilder`] is passed explicitly to whatever declares resources
//! (Rust code or the Lua `setup(stack)` function). [`synthesize`] then runs
//! the pipeline that turns the declared stack into an ordered graph:
//! grant expansion, reference resolution and topological sorting.

mod error;

pub use error::ConfigError;

use serde::Serialize;
use tracing::{debug, info};

use crate::execute::dag::ExecutionDag;
use crate::grant::{self, Access, Grant};
use crate::resolve;
use crate::resource::{Properties, Reference, ResourceId, ResourceKind, ResourceNode, Value};

/// An ordered collection of resource nodes plus the grant declarations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stack {
  pub name: String,
  pub nodes: Vec<ResourceNode>,
  pub grants: Vec<Grant>,
}

impl Stack {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      nodes: Vec::new(),
      grants: Vec::new(),
    }
  }

  pub fn get(&self, id: &str) -> Option<&ResourceNode> {
    self.nodes.iter().find(|n| n.id == id)
  }

  pub fn contains(&self, id: &str) -> bool {
    self.get(id).is_some()
  }

  pub fn ids(&self) -> impl Iterator<Item = &ResourceId> {
    self.nodes.iter().map(|n| &n.id)
  }
}

/// A value returned when declaring a node, usable to build references to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
  pub id: ResourceId,
  pub kind: ResourceKind,
}

impl ResourceHandle {
  pub fn reference(&self, attribute: &str) -> Value {
    Value::Reference(Reference::new(self.id.clone(), attribute))
  }

  pub fn arn(&self) -> Value {
    self.reference("arn")
  }
}

/// Explicit builder for a [`Stack`].
#[derive(Debug, Clone)]
pub struct StackBuilder {
  stack: Stack,
}

impl StackBuilder {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      stack: Stack::new(name),
    }
  }

  pub fn name(&self) -> &str {
    &self.stack.name
  }

  /// Declare a node of any kind.
  pub fn resource(
    &mut self,
    kind: ResourceKind,
    id: impl Into<ResourceId>,
    properties: Properties,
  ) -> Result<ResourceHandle, ConfigError> {
    let node = ResourceNode::new(id, kind, properties);
    self.add(node)
  }

  /// Add a fully formed node, validating its id and kind-specific properties.
  pub fn add(&mut self, node: ResourceNode) -> Result<ResourceHandle, ConfigError> {
    if node.id.is_empty() {
      return Err(ConfigError::InvalidProperty {
        node: node.id,
        property: "id".to_string(),
        reason: "resource id must not be empty".to_string(),
      });
    }
    if self.stack.contains(&node.id) {
      return Err(ConfigError::DuplicateId(node.id));
    }
    validate_properties(&node)?;

    debug!(node = %node.id, kind = %node.kind, "declared resource");
    let handle = ResourceHandle {
      id: node.id.clone(),
      kind: node.kind,
    };
    self.stack.nodes.push(node);
    Ok(handle)
  }

  pub fn bucket(&mut self, id: impl Into<ResourceId>, properties: Properties) -> Result<ResourceHandle, ConfigError> {
    self.resource(ResourceKind::Bucket, id, properties)
  }

  pub fn function(&mut self, id: impl Into<ResourceId>, properties: Properties) -> Result<ResourceHandle, ConfigError> {
    self.resource(ResourceKind::Function, id, properties)
  }

  pub fn user(&mut self, id: impl Into<ResourceId>, properties: Properties) -> Result<ResourceHandle, ConfigError> {
    self.resource(ResourceKind::User, id, properties)
  }

  pub fn role(&mut self, id: impl Into<ResourceId>, properties: Properties) -> Result<ResourceHandle, ConfigError> {
    self.resource(ResourceKind::Role, id, properties)
  }

  pub fn policy(&mut self, id: impl Into<ResourceId>, properties: Properties) -> Result<ResourceHandle, ConfigError> {
    self.resource(ResourceKind::Policy, id, properties)
  }

  pub fn rule(&mut self, id: impl Into<ResourceId>, properties: Properties) -> Result<ResourceHandle, ConfigError> {
    self.resource(ResourceKind::Rule, id, properties)
  }

  /// Record an explicit ordering edge: `node` depends on `target`.
  ///
  /// The target may be declared later; it is validated during synthesis.
  pub fn depends_on(&mut self, node: &str, target: impl Into<ResourceId>) -> Result<(), ConfigError> {
    let target = target.into();
    let Some(entry) = self.stack.nodes.iter_mut().find(|n| n.id == node) else {
      return Err(ConfigError::InvalidProperty {
        node: node.to_string(),
        property: "depends_on".to_string(),
        reason: "resource is not declared".to_string(),
      });
    };
    entry.depends_on.insert(target);
    Ok(())
  }

  /// Declare that `principal` may access `resource`.
  pub fn grant(&mut self, resource: impl Into<ResourceId>, principal: impl Into<ResourceId>, access: Access) {
    self.stack.grants.push(Grant {
      resource: resource.into(),
      principal: principal.into(),
      access,
    });
  }

  pub fn grant_read(&mut self, resource: &ResourceHandle, principal: &ResourceHandle) {
    self.grant(resource.id.clone(), principal.id.clone(), Access::Read);
  }

  pub fn grant_write(&mut self, resource: &ResourceHandle, principal: &ResourceHandle) {
    self.grant(resource.id.clone(), principal.id.clone(), Access::Write);
  }

  pub fn grant_read_write(&mut self, resource: &ResourceHandle, principal: &ResourceHandle) {
    self.grant(resource.id.clone(), principal.id.clone(), Access::ReadWrite);
  }

  pub fn build(self) -> Stack {
    self.stack
  }
}

fn validate_properties(node: &ResourceNode) -> Result<(), ConfigError> {
  if let Some((key, _)) = node.properties.iter().find(|(_, v)| !v.is_finite()) {
    return Err(ConfigError::InvalidProperty {
      node: node.id.clone(),
      property: key.clone(),
      reason: "numbers must be finite".to_string(),
    });
  }

  if node.kind != ResourceKind::Function {
    return Ok(());
  }

  let invalid = |reason: &str| ConfigError::InvalidProperty {
    node: node.id.clone(),
    property: "artifact".to_string(),
    reason: reason.to_string(),
  };

  let artifact = node
    .properties
    .get("artifact")
    .ok_or_else(|| invalid("functions require an artifact { bucket, key }"))?
    .as_map()
    .ok_or_else(|| invalid("artifact must be a table with bucket and key"))?;

  for field in ["bucket", "key"] {
    match artifact.get(field) {
      Some(Value::String(s)) if !s.is_empty() => {}
      Some(Value::Reference(_)) => {}
      _ => return Err(invalid(&format!("artifact.{field} must be a non-empty string or reference"))),
    }
  }
  Ok(())
}

/// Stack names become state file names, so they are restricted to
/// `[A-Za-z0-9_-]`.
pub fn validate_stack_name(name: &str) -> Result<(), ConfigError> {
  let valid = !name.is_empty()
    && name
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
  if valid {
    return Ok(());
  }
  Err(ConfigError::InvalidProperty {
    node: name.to_string(),
    property: "name".to_string(),
    reason: "stack name must be non-empty and contain only letters, digits, '-' or '_'".to_string(),
  })
}

/// A stack after grant expansion and reference resolution, with its order.
#[derive(Debug, Clone)]
pub struct SynthesizedStack {
  pub stack: Stack,
  /// Total order: every node appears after everything it depends on.
  pub order: Vec<ResourceId>,
  /// Levels of mutually independent nodes, for display.
  pub waves: Vec<Vec<ResourceId>>,
}

impl SynthesizedStack {
  /// Nodes in dependency order.
  pub fn ordered_nodes(&self) -> impl Iterator<Item = &ResourceNode> {
    self.order.iter().filter_map(|id| self.stack.get(id))
  }
}

/// Run the synthesis pipeline: expand grants, tag reference edges, sort.
pub fn synthesize(mut stack: Stack) -> Result<SynthesizedStack, ConfigError> {
  grant::expand_grants(&mut stack)?;
  resolve::resolve_references(&mut stack)?;

  let dag = ExecutionDag::new(
    stack.nodes.iter().map(|n| n.id.clone()),
    stack
      .nodes
      .iter()
      .flat_map(|n| n.depends_on.iter().map(move |dep| (n.id.clone(), dep.clone()))),
  );
  let order = dag.topological_order()?;
  let waves = dag.execution_waves()?;

  info!(
    stack = %stack.name,
    nodes = stack.nodes.len(),
    grants = stack.grants.len(),
    waves = waves.len(),
    "synthesized stack"
  );

  Ok(SynthesizedStack { stack, order, waves })
}
