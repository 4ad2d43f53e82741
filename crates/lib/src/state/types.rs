use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::consts::STATE_VERSION;
use crate::resource::{Properties, ResourceId, ResourceKind, ResourceNode};

/// What the last successful operation on a node left behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedResource {
  pub kind: ResourceKind,
  pub external_id: String,
  /// Declared properties, references left unresolved.
  pub last_applied_properties: Properties,
  /// The properties last sent to the backend, references substituted.
  #[serde(default)]
  pub last_resolved_properties: Properties,
  /// Attributes reported by the backend (`arn`, `name`, ...).
  #[serde(default)]
  pub attributes: BTreeMap<String, String>,
  #[serde(default)]
  pub depends_on: BTreeSet<ResourceId>,
}

impl AppliedResource {
  /// Record a node after the backend provisioned it from `resolved`.
  pub fn from_node(
    node: &ResourceNode,
    resolved: Properties,
    external_id: String,
    attributes: BTreeMap<String, String>,
  ) -> Self {
    Self {
      kind: node.kind,
      external_id,
      last_applied_properties: node.properties.clone(),
      last_resolved_properties: resolved,
      attributes,
      depends_on: node.depends_on.clone(),
    }
  }

  /// Look up an attribute; `id` always resolves to the external id.
  pub fn attribute(&self, name: &str) -> Option<&str> {
    if name == "id" {
      return Some(&self.external_id);
    }
    self.attributes.get(name).map(String::as_str)
  }
}

/// The persisted record of every node that exists externally for one stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedState {
  pub version: u32,
  pub stack: String,
  #[serde(default)]
  pub resources: BTreeMap<ResourceId, AppliedResource>,
}

impl AppliedState {
  pub fn new(stack: impl Into<String>) -> Self {
    Self {
      version: STATE_VERSION,
      stack: stack.into(),
      resources: BTreeMap::new(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.resources.is_empty()
  }

  pub fn get(&self, id: &str) -> Option<&AppliedResource> {
    self.resources.get(id)
  }

  /// Ids of applied nodes that recorded a dependency on `id`.
  pub fn dependents_of(&self, id: &str) -> Vec<&ResourceId> {
    self
      .resources
      .iter()
      .filter(|(_, r)| r.depends_on.contains(id))
      .map(|(k, _)| k)
      .collect()
  }
}
