//! Implementation of the `stackup synthesize` command.
//!
//! Evaluates the config, expands grants, orders the graph and diffs it
//! against the applied state. Nothing is written and no backend is called.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use stackup_lib::execute::plan_stack;
use stackup_lib::util::hash::Hashable;

use crate::output::{print_info, print_json, print_plan, print_stat, symbols, truncate_hash};

use super::{load_stack, state_store};

pub fn cmd_synthesize(config: &Path, state: Option<PathBuf>, json: bool) -> Result<()> {
  let stack = load_stack(config)?;
  let store = state_store(state.as_deref(), &stack.name);
  let (synth, _, plan) = plan_stack(stack, &store).context("Failed to synthesize stack")?;
  let hash = plan.compute_hash().context("Failed to compute plan hash")?;

  if json {
    let output = serde_json::json!({
      "stack": synth.stack,
      "order": synth.order,
      "waves": synth.waves,
      "plan": plan,
      "hash": hash.0,
    });
    return print_json(&output);
  }

  print_info(&format!("Stack: {}", synth.stack.name));
  print_stat("Plan hash", truncate_hash(&hash.0));
  print_stat("State", &store.path().display().to_string());
  println!();

  println!("Resources:");
  for node in synth.ordered_nodes() {
    let deps = if node.depends_on.is_empty() {
      String::new()
    } else {
      format!(
        " {} {}",
        symbols::ARROW,
        node.depends_on.iter().cloned().collect::<Vec<_>>().join(", ")
      )
    };
    println!("  {} {} ({}){}", symbols::INFO, node.id, node.kind, deps);
  }
  println!();

  println!("Waves:");
  for (i, wave) in synth.waves.iter().enumerate() {
    println!("  {}: {}", i + 1, wave.join(", "));
  }
  println!();

  if !plan.has_changes() {
    print_info("No changes. Infrastructure matches the configuration.");
    return Ok(());
  }
  println!("Plan:");
  print_plan(&plan, false);

  Ok(())
}
