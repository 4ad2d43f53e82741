//! Apply and destroy orchestration.
//!
//! Apply flow: evaluate config → synthesize → load applied state → diff →
//! execute against the backend, persisting state after each operation.
//! Destroy flow: load applied state → delete every node in reverse order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::backend::ProvisioningBackend;
use crate::eval::{EvalError, evaluate_config};
use crate::plan::{Plan, compute_destroy_plan, compute_plan};
use crate::stack::{ConfigError, Stack, SynthesizedStack, synthesize};
use crate::state::{AppliedState, StateError, StateStore};

use super::execute_plan;
use super::types::{ApplyReport, CancelToken, ExecuteConfig, ExecuteError};

/// Errors that abort an apply or destroy before or outside node execution.
#[derive(Debug, Error)]
pub enum ApplyError {
  /// Config evaluation failed.
  #[error("evaluation error: {0}")]
  Eval(#[from] EvalError),

  /// The declared stack is invalid.
  #[error("configuration error: {0}")]
  Config(#[from] ConfigError),

  /// Applied state could not be read or written.
  #[error("state error: {0}")]
  State(#[from] StateError),

  /// Execution aborted.
  #[error("execution error: {0}")]
  Execute(#[from] ExecuteError),

  /// Config file not found.
  #[error("config file not found: {0}")]
  ConfigNotFound(PathBuf),
}

/// Options for apply and destroy.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
  /// Execution configuration (parallelism, retry policy).
  pub execute: ExecuteConfig,

  /// Compute the plan but don't call the backend.
  pub dry_run: bool,

  /// State file override. Defaults to `<state_dir>/<stack name>.json`.
  pub state_path: Option<PathBuf>,
}

impl ApplyOptions {
  fn store_for(&self, stack_name: &str) -> StateStore {
    match &self.state_path {
      Some(path) => StateStore::new(path.clone()),
      None => StateStore::for_stack(stack_name),
    }
  }
}

/// Result of an apply or destroy.
#[derive(Debug, Clone)]
pub struct ApplyResult {
  pub plan: Plan,

  /// `None` for dry runs.
  pub report: Option<ApplyReport>,

  /// Where the applied state lives.
  pub state_path: PathBuf,
}

impl ApplyResult {
  /// True for dry runs and for runs where every node ended applied or no-op.
  pub fn is_success(&self) -> bool {
    self.report.as_ref().is_none_or(ApplyReport::is_success)
  }
}

/// Synthesize a stack and diff it against the stored state. No side effects.
pub fn plan_stack(stack: Stack, store: &StateStore) -> Result<(SynthesizedStack, AppliedState, Plan), ApplyError> {
  let synth = synthesize(stack)?;
  let state = store.load_or_empty(&synth.stack.name)?;
  let plan = compute_plan(&synth, &state)?;
  Ok((synth, state, plan))
}

/// Apply an already declared stack.
pub async fn apply_stack(
  stack: Stack,
  backend: Arc<dyn ProvisioningBackend>,
  options: &ApplyOptions,
  cancel: &CancelToken,
) -> Result<ApplyResult, ApplyError> {
  let store = options.store_for(&stack.name);
  let (_, mut state, plan) = plan_stack(stack, &store)?;

  if options.dry_run {
    info!(stack = %plan.stack, "dry run, not executing");
    return Ok(ApplyResult {
      plan,
      report: None,
      state_path: store.path().to_path_buf(),
    });
  }

  let report = execute_plan(&plan, backend, &store, &mut state, &options.execute, cancel).await?;
  Ok(ApplyResult {
    plan,
    report: Some(report),
    state_path: store.path().to_path_buf(),
  })
}

/// Evaluate a config file and apply the stack it declares.
pub async fn apply(
  config_path: &Path,
  backend: Arc<dyn ProvisioningBackend>,
  options: &ApplyOptions,
  cancel: &CancelToken,
) -> Result<ApplyResult, ApplyError> {
  info!(config = %config_path.display(), "starting apply");

  if !config_path.exists() {
    return Err(ApplyError::ConfigNotFound(config_path.to_path_buf()));
  }

  let stack = evaluate_config(config_path)?;
  apply_stack(stack, backend, options, cancel).await
}

/// Delete every node recorded in the state of `stack_name`.
///
/// The state file is removed once every node has been deleted.
pub async fn destroy(
  stack_name: &str,
  backend: Arc<dyn ProvisioningBackend>,
  options: &ApplyOptions,
  cancel: &CancelToken,
) -> Result<ApplyResult, ApplyError> {
  let store = options.store_for(stack_name);
  let mut state = store.load_or_empty(stack_name)?;
  info!(stack = stack_name, resources = state.resources.len(), dry_run = options.dry_run, "starting destroy");

  let plan = compute_destroy_plan(&state)?;
  let state_path = store.path().to_path_buf();

  if options.dry_run {
    return Ok(ApplyResult {
      plan,
      report: None,
      state_path,
    });
  }

  let report = execute_plan(&plan, backend, &store, &mut state, &options.execute, cancel).await?;
  if report.is_success() && state.is_empty() {
    store.remove()?;
  }

  Ok(ApplyResult {
    plan,
    report: Some(report),
    state_path,
  })
}
