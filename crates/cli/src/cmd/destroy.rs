//! Implementation of the `stackup destroy` command.
//!
//! Deletes every resource recorded in the applied state, dependents first.
//! The config is only read for the stack name.

use std::path::Path;

use anyhow::{Context, Result};

use stackup_lib::execute::destroy;

use crate::RunArgs;
use crate::output::{print_error, print_info, print_plan, print_report, print_success};

use super::{apply_options, cancel_on_ctrl_c, load_stack, local_backend, runtime};

pub fn cmd_destroy(config: &Path, run: &RunArgs) -> Result<()> {
  let stack = load_stack(config)?;
  let options = apply_options(run);

  let rt = runtime()?;
  let cancel = cancel_on_ctrl_c(&rt);
  let result = rt
    .block_on(destroy(&stack.name, local_backend(), &options, &cancel))
    .context("Destroy failed")?;

  if result.plan.operations.is_empty() {
    print_info("Nothing to destroy.");
    return Ok(());
  }

  let Some(report) = &result.report else {
    print_info("Destroy dry run:");
    print_plan(&result.plan, false);
    return Ok(());
  };

  print_report(report);
  println!();

  if report.is_success() {
    print_success("Destroy complete!");
    return Ok(());
  }

  print_error(&format!(
    "Destroy finished with errors; remaining resources are kept in {}",
    result.state_path.display()
  ));
  std::process::exit(1);
}
