//! Synthesis-time reference resolution.
//!
//! References stay unresolved in the property bags; this pass only turns each
//! one into a dependency edge and checks that every target exists.

use std::collections::HashSet;

use tracing::debug;

use crate::resource::ResourceId;
use crate::stack::{ConfigError, Stack};

/// Add every referenced node to the referencing node's `depends_on`.
///
/// Explicit `depends_on` entries are validated the same way. Running this
/// more than once leaves the edge set unchanged.
pub fn resolve_references(stack: &mut Stack) -> Result<(), ConfigError> {
  let known: HashSet<ResourceId> = stack.ids().cloned().collect();

  for node in &mut stack.nodes {
    let targets: Vec<ResourceId> = node.references().into_iter().map(|r| r.target.clone()).collect();
    node.depends_on.extend(targets);

    if let Some(target) = node.depends_on.iter().find(|dep| !known.contains(*dep)) {
      return Err(ConfigError::UnknownReference {
        node: node.id.clone(),
        target: target.clone(),
      });
    }

    if !node.depends_on.is_empty() {
      debug!(node = %node.id, depends_on = ?node.depends_on, "resolved dependencies");
    }
  }

  Ok(())
}
