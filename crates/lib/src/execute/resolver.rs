//! Apply-time reference resolution.
//!
//! Right before a node's operation is sent to the backend, every
//! `Value::Reference` in its properties is replaced by the referenced node's
//! attribute as recorded in the applied state.

use crate::resource::{Properties, Reference, Value};
use crate::state::AppliedState;

use super::types::OperationError;

/// Something that can look up provisioned attributes of other nodes.
pub trait AttributeResolver {
  /// Resolve `attribute` of `target`. `id` resolves to the external id.
  fn resolve_attribute(&self, target: &str, attribute: &str) -> Option<&str>;
}

impl AttributeResolver for AppliedState {
  fn resolve_attribute(&self, target: &str, attribute: &str) -> Option<&str> {
    self.get(target)?.attribute(attribute)
  }
}

/// Replace every reference in `properties` with its resolved value.
pub fn resolve_properties(properties: &Properties, resolver: &impl AttributeResolver) -> Result<Properties, OperationError> {
  let mut lookup = |r: &Reference| {
    resolver
      .resolve_attribute(&r.target, &r.attribute)
      .map(|v| Value::String(v.to_string()))
      .ok_or_else(|| OperationError::UnresolvedReference {
        target: r.target.clone(),
        attribute: r.attribute.clone(),
      })
  };

  properties
    .iter()
    .map(|(k, v)| -> Result<_, OperationError> { Ok((k.clone(), v.resolve(&mut lookup)?)) })
    .collect()
}
