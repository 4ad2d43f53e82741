//! Status command implementation.
//!
//! Displays the applied state of a stack.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use stackup_lib::state::StateStore;

use crate::output::{self, print_info, print_json, print_stat, print_success};

use super::{load_stack, state_store};

pub fn cmd_status(config: &Path, state: Option<PathBuf>, json: bool) -> Result<()> {
  // An explicit state file doesn't need the config.
  let store = match state {
    Some(path) => StateStore::new(path),
    None => {
      let stack = load_stack(config)?;
      state_store(None, &stack.name)
    }
  };

  let Some(applied) = store.load().context("Failed to load applied state")? else {
    print_info("No applied state found. Run 'stackup apply' to create one.");
    return Ok(());
  };

  if json {
    return print_json(&applied);
  }

  print_success(&format!("Stack: {}", applied.stack));
  print_stat("State", &store.path().display().to_string());
  print_stat("Resources", &applied.resources.len().to_string());
  println!();

  for (id, resource) in &applied.resources {
    println!(
      "  {} {} ({}) {}",
      output::symbols::INFO,
      id,
      resource.kind,
      resource.external_id
    );
    for (name, value) in &resource.attributes {
      println!("      {}: {}", name, value);
    }
  }

  Ok(())
}
