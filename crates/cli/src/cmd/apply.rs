//! Implementation of the `stackup apply` command.

use std::path::Path;

use anyhow::{Context, Result};

use stackup_lib::execute::apply;

use crate::RunArgs;
use crate::output::{print_error, print_info, print_plan, print_report, print_success, print_warning};

use super::{apply_options, cancel_on_ctrl_c, local_backend, runtime};

/// Evaluate the config and bring the backend in line with it.
///
/// Exits with status 1 when any node ends failed, skipped or cancelled.
pub fn cmd_apply(config: &Path, run: &RunArgs) -> Result<()> {
  let options = apply_options(run);

  let rt = runtime()?;
  let cancel = cancel_on_ctrl_c(&rt);
  let result = rt
    .block_on(apply(config, local_backend(), &options, &cancel))
    .context("Apply failed")?;

  if !result.plan.has_changes() {
    print_info("No changes. Infrastructure matches the configuration.");
    return Ok(());
  }

  let Some(report) = &result.report else {
    print_info("Dry run, nothing applied:");
    print_plan(&result.plan, true);
    return Ok(());
  };

  print_report(report);
  println!();

  if report.is_success() {
    print_success(&format!("Apply complete! State: {}", result.state_path.display()));
    return Ok(());
  }

  if report.cancelled() > 0 {
    print_warning("Apply was interrupted; run it again to finish");
  }
  print_error("Apply finished with errors");
  std::process::exit(1);
}
