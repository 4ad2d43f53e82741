//! Implementation of the `stackup init` command.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use stackup_lib::init::{InitOptions, init};

use crate::output::symbols;

/// Scaffold `stack.lua` and LuaLS configuration in `path`.
///
/// # Errors
///
/// Returns an error if files already exist or if there are permission issues.
pub fn cmd_init(path: &Path) -> Result<()> {
  let options = InitOptions {
    config_path: path.to_path_buf(),
  };

  let result = init(&options).context("Failed to initialize configuration")?;

  println!(
    "{} {}",
    symbols::SUCCESS.green(),
    "Initialized stack configuration!".green().bold()
  );
  println!();
  println!(
    "  {} Config directory: {}",
    symbols::INFO.cyan(),
    result.config_dir.display()
  );
  println!(
    "  {} Stack:            {}",
    symbols::INFO.cyan(),
    result.stack_lua.display()
  );
  println!(
    "  {} LuaLS config:     {}",
    symbols::INFO.cyan(),
    result.luarc_json.display()
  );
  println!(
    "  {} Type definitions: {}",
    symbols::INFO.cyan(),
    result.types_dir.display()
  );
  println!();
  println!("{}", "Next steps:".bold());
  println!(
    "  1. Edit {} to describe your stack",
    result.stack_lua.display().to_string().cyan()
  );
  println!(
    "  2. Run: {}",
    format!("stackup synthesize {}", result.stack_lua.display()).cyan()
  );

  Ok(())
}
