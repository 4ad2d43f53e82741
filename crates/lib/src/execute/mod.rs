//! Plan execution module.
//!
//! This module provides the main entry point for executing a plan against a
//! provisioning backend. It handles:
//! - Dependency ordering through the plan's operation DAG
//! - Parallel execution of independent operations
//! - Failure propagation and skip tracking
//! - Persisting applied state after every successful operation
//! - Cooperative cancellation

pub mod apply;
pub mod dag;
pub mod resolver;
pub mod retry;
pub mod types;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::backend::{BackendAction, BackendRequest, BackendResponse, ProvisioningBackend};
use crate::plan::{Operation, OperationKind, Plan};
use crate::resource::{Properties, ResourceId};
use crate::state::{AppliedResource, AppliedState, StateStore};

use resolver::resolve_properties;

pub use apply::{ApplyError, ApplyOptions, ApplyResult, apply, apply_stack, destroy, plan_stack};
pub use dag::ExecutionDag;
pub use retry::RetryPolicy;
pub use types::{ApplyReport, CancelToken, ExecuteConfig, ExecuteError, NodeReport, NodeStatus, OperationError};

type TaskOutput = (usize, Properties, Result<(BackendResponse, u32), OperationError>);

/// Bookkeeping for one run. Only the coordinating task touches it.
struct Run<'a> {
  plan: &'a Plan,
  dag: ExecutionDag,
  positions: HashMap<ResourceId, usize>,
  waiting_on: HashMap<ResourceId, usize>,
  ready: BTreeSet<usize>,
  statuses: HashMap<ResourceId, (NodeStatus, u32)>,
  /// Planned no-ops that ran as updates because a referenced attribute changed.
  promoted: BTreeSet<ResourceId>,
}

impl<'a> Run<'a> {
  fn new(plan: &'a Plan) -> Self {
    let dag = plan.dag();
    let positions: HashMap<ResourceId, usize> = plan
      .operations
      .iter()
      .enumerate()
      .map(|(pos, op)| (op.node_id.clone(), pos))
      .collect();
    let waiting_on: HashMap<ResourceId, usize> = plan
      .operations
      .iter()
      .map(|op| (op.node_id.clone(), dag.dependencies(&op.node_id).len()))
      .collect();
    let ready = plan
      .operations
      .iter()
      .enumerate()
      .filter(|(_, op)| waiting_on.get(&op.node_id).copied().unwrap_or(0) == 0)
      .map(|(pos, _)| pos)
      .collect();

    Self {
      plan,
      dag,
      positions,
      waiting_on,
      ready,
      statuses: HashMap::new(),
      promoted: BTreeSet::new(),
    }
  }

  fn is_done(&self, id: &str) -> bool {
    self.statuses.contains_key(id)
  }

  /// Record a success and release dependents whose prerequisites are all done.
  fn succeed(&mut self, id: &ResourceId, status: NodeStatus, attempts: u32) {
    self.statuses.insert(id.clone(), (status, attempts));
    for dependent in self.dag.dependents(id) {
      let Some(count) = self.waiting_on.get_mut(&dependent) else {
        continue;
      };
      *count = count.saturating_sub(1);
      if *count == 0
        && !self.statuses.contains_key(&dependent)
        && let Some(&pos) = self.positions.get(&dependent)
      {
        self.ready.insert(pos);
      }
    }
  }

  /// Record a failure and mark every transitive dependent as skipped.
  fn fail(&mut self, id: &ResourceId, err: OperationError) {
    error!(node = %id, error = %err, "operation failed");
    let attempts = err.attempts();
    self.statuses.insert(id.clone(), (NodeStatus::Failed(err), attempts));

    let mut pending = self.dag.dependents(id);
    while let Some(dependent) = pending.pop() {
      if self.statuses.contains_key(&dependent) {
        continue;
      }
      warn!(node = %dependent, failed_dep = %id, "skipping operation due to failed dependency");
      self.statuses.insert(
        dependent.clone(),
        (
          NodeStatus::Skipped {
            failed_dependency: id.clone(),
          },
          0,
        ),
      );
      pending.extend(self.dag.dependents(&dependent));
    }
  }

  fn into_report(mut self, stack: &str, started: Instant) -> ApplyReport {
    let nodes = self
      .plan
      .operations
      .iter()
      .map(|op| {
        let (status, attempts) = self
          .statuses
          .remove(&op.node_id)
          .unwrap_or((NodeStatus::Cancelled, 0));
        let operation = if self.promoted.contains(&op.node_id) {
          OperationKind::Update
        } else {
          op.kind
        };
        NodeReport {
          node_id: op.node_id.clone(),
          resource_kind: op.resource_kind,
          operation,
          status,
          attempts,
        }
      })
      .collect();

    ApplyReport {
      stack: stack.to_string(),
      nodes,
      duration: started.elapsed(),
    }
  }
}

/// Build the backend request for an operation, resolving references against
/// what has been applied so far.
///
/// Returns `None` for a no-op whose references still resolve to what the
/// backend last received. A no-op whose resolved properties drifted becomes
/// an update.
fn prepare(op: &Operation, state: &AppliedState) -> Result<Option<BackendRequest>, OperationError> {
  let missing = |what: &str| OperationError::Permanent {
    attempts: 0,
    message: format!("{} has no {what}", op.node_id),
  };

  let (action, properties) = match op.kind {
    OperationKind::Delete => (BackendAction::Delete, Properties::new()),
    OperationKind::Create | OperationKind::Update | OperationKind::NoOp => {
      let desired = op.desired.as_ref().ok_or_else(|| missing("desired state"))?;
      let properties = resolve_properties(&desired.properties, state)?;
      let action = match op.kind {
        OperationKind::Create => BackendAction::Create,
        OperationKind::NoOp
          if op
            .previous
            .as_ref()
            .is_some_and(|p| p.last_resolved_properties == properties) =>
        {
          return Ok(None);
        }
        _ => BackendAction::Update,
      };
      (action, properties)
    }
  };

  let external_id = match action {
    BackendAction::Create => None,
    _ => Some(op.external_id().ok_or_else(|| missing("external id"))?.to_string()),
  };

  Ok(Some(BackendRequest {
    action,
    node_id: op.node_id.clone(),
    kind: op.resource_kind,
    external_id,
    properties,
  }))
}

/// Fold a successful backend response into the applied state.
fn record(
  op: &Operation,
  resolved: Properties,
  response: BackendResponse,
  state: &mut AppliedState,
) -> Result<(), OperationError> {
  match (op.kind, response) {
    (OperationKind::Delete, _) => {
      state.resources.remove(&op.node_id);
      Ok(())
    }
    (_, BackendResponse::Provisioned { external_id, attributes }) => {
      let Some(desired) = &op.desired else {
        return Err(OperationError::Permanent {
          attempts: 0,
          message: format!("{} has no desired state", op.node_id),
        });
      };
      state.resources.insert(
        op.node_id.clone(),
        AppliedResource::from_node(desired, resolved, external_id, attributes),
      );
      Ok(())
    }
    (_, BackendResponse::Deleted) => Err(OperationError::Permanent {
      attempts: 0,
      message: format!("backend reported {} deleted during {}", op.node_id, op.kind),
    }),
  }
}

/// Execute a plan against a backend.
///
/// This is the main entry point for plan execution. It:
/// 1. Builds the operation DAG from the plan
/// 2. Launches every operation whose prerequisites are done, lowest plan
///    position first, up to `config.parallelism` at a time
/// 3. Persists `state` through `store` after every successful operation
/// 4. Marks dependents of failed operations as skipped
/// 5. Stops launching once `cancel` fires and reports never-started
///    operations as cancelled
///
/// With a parallelism of 1 operations run exactly in plan order.
pub async fn execute_plan(
  plan: &Plan,
  backend: Arc<dyn ProvisioningBackend>,
  store: &StateStore,
  state: &mut AppliedState,
  config: &ExecuteConfig,
  cancel: &CancelToken,
) -> Result<ApplyReport, ExecuteError> {
  let started = Instant::now();
  let parallelism = config.parallelism.max(1);
  info!(
    stack = %plan.stack,
    operations = plan.operations.len(),
    parallelism,
    backend = backend.name(),
    "starting plan execution"
  );

  state.stack = plan.stack.clone();
  let mut run = Run::new(plan);
  let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
  let mut in_flight: BTreeSet<usize> = BTreeSet::new();

  loop {
    // No-ops settle even after cancellation; only backend calls stop.
    while tasks.len() < parallelism {
      let Some(pos) = run.ready.pop_first() else {
        break;
      };
      let op = &plan.operations[pos];
      if run.is_done(&op.node_id) {
        continue;
      }

      let request = match prepare(op, state) {
        Ok(Some(request)) => request,
        Ok(None) => {
          debug!(node = %op.node_id, "no changes");
          run.succeed(&op.node_id, NodeStatus::NoOp, 0);
          continue;
        }
        Err(_) if cancel.is_cancelled() => continue,
        Err(err) => {
          run.fail(&op.node_id, err);
          continue;
        }
      };
      if cancel.is_cancelled() {
        continue;
      }

      if op.kind == OperationKind::NoOp {
        info!(node = %op.node_id, "referenced attributes changed, updating");
        run.promoted.insert(op.node_id.clone());
      }

      debug!(node = %op.node_id, action = %request.action, "launching operation");
      let backend = backend.clone();
      let retry = config.retry.clone();
      in_flight.insert(pos);
      tasks.spawn(async move {
        let result = retry.execute(backend.as_ref(), &request).await;
        (pos, request.properties, result)
      });
    }

    let Some(joined) = tasks.join_next().await else {
      break;
    };

    let (pos, resolved, result) = match joined {
      Ok(output) => output,
      Err(e) => {
        error!(error = %e, "operation task panicked");
        continue;
      }
    };
    in_flight.remove(&pos);
    let op = &plan.operations[pos];

    let outcome = result.and_then(|(response, attempts)| record(op, resolved, response, state).map(|()| attempts));
    match outcome {
      Ok(attempts) => {
        if let Err(e) = store.save(state) {
          error!(node = %op.node_id, error = %e, "failed to persist state, aborting");
          tasks.abort_all();
          return Err(e.into());
        }
        info!(node = %op.node_id, attempts, "operation succeeded");
        run.succeed(&op.node_id, NodeStatus::Applied, attempts);
      }
      Err(err) => run.fail(&op.node_id, err),
    }
  }

  for pos in in_flight {
    let id = plan.operations[pos].node_id.clone();
    run.fail(
      &id,
      OperationError::Permanent {
        attempts: 0,
        message: "operation task panicked".to_string(),
      },
    );
  }

  if cancel.is_cancelled() {
    warn!("cancelled, operations not yet started were left untouched");
  }

  let report = run.into_report(&plan.stack, started);
  info!(
    applied = report.applied(),
    noop = report.noop(),
    failed = report.failed(),
    skipped = report.skipped(),
    cancelled = report.cancelled(),
    "plan execution complete"
  );

  Ok(report)
}
