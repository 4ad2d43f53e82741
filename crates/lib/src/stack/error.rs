use thiserror::Error;

use crate::resource::{ResourceId, ResourceKind};

/// Configuration errors. All of them abort before any external call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
  #[error("dependency cycle: {}", format_cycle(.cycle))]
  CyclicDependency { cycle: Vec<ResourceId> },

  #[error("'{node}' references unknown resource '{target}'")]
  UnknownReference { node: ResourceId, target: ResourceId },

  #[error("resource id '{0}' is declared more than once")]
  DuplicateId(ResourceId),

  #[error("invalid property '{property}' on '{node}': {reason}")]
  InvalidProperty {
    node: ResourceId,
    property: String,
    reason: String,
  },

  #[error("cannot grant on '{node}' ({kind}): {reason}")]
  UnsupportedGrant {
    node: ResourceId,
    kind: ResourceKind,
    reason: String,
  },

  #[error(
    "grants of '{principal}' on '{resource}' and of '{other_principal}' on '{other_resource}' both expand to policy '{id}'; rename one of them"
  )]
  PolicyIdCollision {
    id: ResourceId,
    principal: ResourceId,
    resource: ResourceId,
    other_principal: ResourceId,
    other_resource: ResourceId,
  },

  #[error("'{node}' changed kind from {previous} to {current}; remove it and re-add it under a new id")]
  KindChanged {
    node: ResourceId,
    previous: ResourceKind,
    current: ResourceKind,
  },
}

fn format_cycle(cycle: &[ResourceId]) -> String {
  match cycle.first() {
    Some(first) => format!("{} -> {}", cycle.join(" -> "), first),
    None => String::new(),
  }
}
