//! Types for plan execution.
//!
//! This module defines the per-node terminal statuses, the report returned by
//! an apply, the error types and the execution configuration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::backend::BackendError;
use crate::plan::OperationKind;
use crate::resource::{ResourceId, ResourceKind};
use crate::stack::ConfigError;
use crate::state::StateError;

use super::retry::RetryPolicy;

/// Why a single node's operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum OperationError {
  /// The backend rejected the operation; not retried.
  #[error("backend rejected operation after {attempts} attempt(s): {message}")]
  Permanent { attempts: u32, message: String },

  /// Transient errors persisted past the retry budget.
  #[error("operation failed after {attempts} attempt(s): {last}")]
  OperationFailed {
    attempts: u32,
    #[serde(serialize_with = "serialize_display")]
    last: BackendError,
  },

  /// A referenced attribute was not available when the node came up.
  #[error("cannot resolve reference to '{attribute}' of '{target}'")]
  UnresolvedReference { target: ResourceId, attribute: String },
}

fn serialize_display<S: serde::Serializer>(value: &BackendError, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.collect_str(value)
}

impl OperationError {
  pub fn attempts(&self) -> u32 {
    match self {
      OperationError::Permanent { attempts, .. } | OperationError::OperationFailed { attempts, .. } => *attempts,
      OperationError::UnresolvedReference { .. } => 0,
    }
  }
}

/// Terminal status of one node after an apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NodeStatus {
  /// The backend carried out the operation.
  Applied,
  /// Nothing to do.
  NoOp,
  Failed(OperationError),
  /// A dependency failed (or, for deletes, a dependent failed to go away).
  Skipped { failed_dependency: ResourceId },
  /// Never started because the run was cancelled.
  Cancelled,
}

impl NodeStatus {
  pub fn is_success(&self) -> bool {
    matches!(self, NodeStatus::Applied | NodeStatus::NoOp)
  }
}

/// Outcome for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeReport {
  pub node_id: ResourceId,
  pub resource_kind: ResourceKind,
  pub operation: OperationKind,
  pub status: NodeStatus,
  pub attempts: u32,
}

/// Result of executing a plan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
  pub stack: String,
  /// One entry per operation, in plan order.
  pub nodes: Vec<NodeReport>,
  #[serde(skip)]
  pub duration: Duration,
}

impl ApplyReport {
  /// Returns true if no node failed, was skipped or was cancelled.
  pub fn is_success(&self) -> bool {
    self.nodes.iter().all(|n| n.status.is_success())
  }

  pub fn total(&self) -> usize {
    self.nodes.len()
  }

  pub fn get(&self, node_id: &str) -> Option<&NodeReport> {
    self.nodes.iter().find(|n| n.node_id == node_id)
  }

  pub fn status(&self, node_id: &str) -> Option<&NodeStatus> {
    self.get(node_id).map(|n| &n.status)
  }

  pub fn applied(&self) -> usize {
    self.count(|s| matches!(s, NodeStatus::Applied))
  }

  pub fn noop(&self) -> usize {
    self.count(|s| matches!(s, NodeStatus::NoOp))
  }

  pub fn failed(&self) -> usize {
    self.count(|s| matches!(s, NodeStatus::Failed(_)))
  }

  pub fn skipped(&self) -> usize {
    self.count(|s| matches!(s, NodeStatus::Skipped { .. }))
  }

  pub fn cancelled(&self) -> usize {
    self.count(|s| matches!(s, NodeStatus::Cancelled))
  }

  fn count(&self, pred: impl Fn(&NodeStatus) -> bool) -> usize {
    self.nodes.iter().filter(|n| pred(&n.status)).count()
  }
}

/// Errors that abort a whole run, as opposed to failing a single node.
#[derive(Debug, Error)]
pub enum ExecuteError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  /// Applied state could not be persisted after a successful operation.
  #[error("failed to persist applied state: {0}")]
  State(#[from] StateError),
}

/// Configuration for plan execution.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Maximum number of backend operations in flight at once.
  pub parallelism: usize,

  pub retry: RetryPolicy,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
      retry: RetryPolicy::default(),
    }
  }
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

/// Cooperative cancellation flag shared between the CLI and the executor.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}
