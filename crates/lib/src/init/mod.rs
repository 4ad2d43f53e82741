//! Scaffold a new stack configuration directory.
//!
//! `stackup init` writes:
//! - `stack.lua` declaring the notification service stack
//! - `.luarc.json` pointing LuaLS at the `stack` type definitions
//! - `<data_dir>/types/stack.d.lua`

mod templates;

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::consts::DEFAULT_CONFIG;
use crate::platform::paths::data_dir;

pub use templates::{LUARC_JSON_TEMPLATE, STACK_D_LUA, STACK_LUA_TEMPLATE};

/// Errors that can occur during initialization.
#[derive(Debug, Error)]
pub enum InitError {
  #[error("file already exists: {}", path.display())]
  PathExists { path: PathBuf },

  #[error("failed to create directory {}: {source}", path.display())]
  CreateDir { path: PathBuf, source: std::io::Error },

  #[error("failed to write file {}: {source}", path.display())]
  WriteFile { path: PathBuf, source: std::io::Error },

  #[error("failed to canonicalize path {}: {source}", path.display())]
  Canonicalize { path: PathBuf, source: std::io::Error },
}

/// Options for initializing a configuration directory.
pub struct InitOptions {
  /// Directory to create the configuration in
  pub config_path: PathBuf,
}

/// Result of a successful initialization.
#[derive(Debug)]
pub struct InitResult {
  /// The configuration directory (canonicalized)
  pub config_dir: PathBuf,
  /// Path to created stack.lua
  pub stack_lua: PathBuf,
  /// Path to created .luarc.json
  pub luarc_json: PathBuf,
  /// Path to types directory
  pub types_dir: PathBuf,
}

fn write(path: &PathBuf, content: &str) -> Result<(), InitError> {
  fs::write(path, content).map_err(|e| InitError::WriteFile {
    path: path.clone(),
    source: e,
  })
}

/// Initialize a new stack configuration directory.
///
/// # Errors
///
/// Returns an error if `stack.lua` or `.luarc.json` already exist, or if a
/// directory or file cannot be written.
pub fn init(options: &InitOptions) -> Result<InitResult, InitError> {
  let config_dir = &options.config_path;

  fs::create_dir_all(config_dir).map_err(|e| InitError::CreateDir {
    path: config_dir.clone(),
    source: e,
  })?;

  let config_dir = dunce::canonicalize(config_dir).map_err(|e| InitError::Canonicalize {
    path: options.config_path.clone(),
    source: e,
  })?;

  let stack_lua = config_dir.join(DEFAULT_CONFIG);
  let luarc_json = config_dir.join(".luarc.json");

  if stack_lua.exists() {
    return Err(InitError::PathExists { path: stack_lua });
  }
  if luarc_json.exists() {
    return Err(InitError::PathExists { path: luarc_json });
  }

  let types_dir = data_dir().join("types");
  fs::create_dir_all(&types_dir).map_err(|e| InitError::CreateDir {
    path: types_dir.clone(),
    source: e,
  })?;

  write(&stack_lua, STACK_LUA_TEMPLATE)?;

  let types_path = types_dir.to_string_lossy();
  write(&luarc_json, &LUARC_JSON_TEMPLATE.replace("{types_path}", &types_path))?;
  write(&types_dir.join("stack.d.lua"), STACK_D_LUA)?;

  info!(path = %stack_lua.display(), "initialized stack configuration");

  Ok(InitResult {
    config_dir,
    stack_lua,
    luarc_json,
    types_dir,
  })
}
