mod apply;
mod destroy;
mod init;
mod status;
mod synth;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;
use tracing::warn;

use stackup_lib::backend::{LocalBackend, ProvisioningBackend};
use stackup_lib::eval::evaluate_config;
use stackup_lib::execute::{ApplyOptions, CancelToken, ExecuteConfig};
use stackup_lib::platform::paths;
use stackup_lib::stack::Stack;
use stackup_lib::state::StateStore;

use crate::RunArgs;

pub use apply::cmd_apply;
pub use destroy::cmd_destroy;
pub use init::cmd_init;
pub use status::cmd_status;
pub use synth::cmd_synthesize;

fn load_stack(config: &Path) -> Result<Stack> {
  if !config.exists() {
    anyhow::bail!("config file not found: {}", config.display());
  }
  evaluate_config(config).with_context(|| format!("Failed to evaluate config: {}", config.display()))
}

fn state_store(state: Option<&Path>, stack_name: &str) -> StateStore {
  match state {
    Some(path) => StateStore::new(path),
    None => StateStore::for_stack(stack_name),
  }
}

fn apply_options(run: &RunArgs) -> ApplyOptions {
  let mut execute = ExecuteConfig::default();
  if let Some(parallelism) = run.parallelism {
    execute.parallelism = parallelism.max(1);
  }
  if let Some(max_attempts) = run.max_attempts {
    execute.retry.max_attempts = max_attempts;
  }
  if let Some(delay) = run.retry_delay {
    execute.retry.initial_delay = delay;
  }

  ApplyOptions {
    execute,
    dry_run: run.dry_run,
    state_path: run.state.clone(),
  }
}

/// The file-backed emulator rooted at the cloud directory.
fn local_backend() -> Arc<dyn ProvisioningBackend> {
  Arc::new(LocalBackend::new(paths::cloud_dir()).with_artifact_root(paths::artifact_dir()))
}

fn runtime() -> Result<Runtime> {
  Runtime::new().context("Failed to create async runtime")
}

/// Cancel the run on Ctrl-C. In-flight operations still finish and persist.
fn cancel_on_ctrl_c(rt: &Runtime) -> CancelToken {
  let cancel = CancelToken::new();
  let token = cancel.clone();
  rt.spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt received, waiting for in-flight operations");
      token.cancel();
    }
  });
  cancel
}
