//! Provisioning backends.
//!
//! A backend receives one fully resolved operation at a time and reports
//! either the provisioned object's identity and attributes, or its deletion.
//! Errors are classified as transient (worth retrying) or permanent.

mod local;
mod memory;

pub use local::LocalBackend;
pub use memory::{Fault, MemoryBackend, RecordedCall};

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::resource::{Properties, ResourceId, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BackendAction {
  Create,
  Update,
  Delete,
}

impl fmt::Display for BackendAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BackendAction::Create => write!(f, "create"),
      BackendAction::Update => write!(f, "update"),
      BackendAction::Delete => write!(f, "delete"),
    }
  }
}

/// A single operation with every reference already resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendRequest {
  pub action: BackendAction,
  pub node_id: ResourceId,
  pub kind: ResourceKind,
  /// Set for updates and deletes.
  pub external_id: Option<String>,
  /// Resolved properties; empty for deletes.
  pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendResponse {
  Provisioned {
    external_id: String,
    attributes: BTreeMap<String, String>,
  },
  Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
  #[error("transient: {0}")]
  Transient(String),

  #[error("permanent: {0}")]
  Permanent(String),
}

impl BackendError {
  pub fn is_transient(&self) -> bool {
    matches!(self, BackendError::Transient(_))
  }
}

/// The cloud API the apply engine talks to.
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
  /// Short name used in logs and output.
  fn name(&self) -> &str;

  async fn execute(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError>;
}
