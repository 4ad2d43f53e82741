//! Configuration file evaluation.
//!
//! A config file returns `{ name = "...", setup = function(stack) ... end }`.
//! [`evaluate_config`] runs `setup` against a fresh [`StackBuilder`] and
//! returns the declared [`Stack`].

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use mlua::prelude::*;
use tracing::{debug, info};

use crate::lua::runtime;
use crate::lua::stack::{LuaStack, config_error};
use crate::stack::{ConfigError, Stack, StackBuilder, validate_stack_name};

/// Errors that can occur during config evaluation.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
  /// Lua evaluation error.
  #[error("lua error: {0}")]
  Lua(#[from] LuaError),

  /// The config declared something invalid.
  #[error(transparent)]
  Config(#[from] ConfigError),
}

impl EvalError {
  /// Unwrap configuration errors raised from inside Lua callbacks.
  fn from_lua(err: LuaError) -> Self {
    match config_error(&err) {
      Some(config) => EvalError::Config(config),
      None => EvalError::Lua(err),
    }
  }
}

/// Evaluate a Lua configuration file and return the declared stack.
///
/// # Example
/// ```ignore
/// use std::path::Path;
/// use stackup_lib::eval::evaluate_config;
///
/// let stack = evaluate_config(Path::new("stack.lua"))?;
/// println!("{} resources", stack.nodes.len());
/// ```
pub fn evaluate_config(path: &Path) -> Result<Stack, EvalError> {
  let builder;

  // lua must be dropped before the builder Rc can be unwrapped
  {
    let lua = runtime::create_runtime()?;
    let config = runtime::load_file(&lua, path)?;

    let LuaValue::Table(config) = config else {
      return Err(LuaError::external("config must return a table with 'name' and 'setup'").into());
    };

    let name: String = config
      .get::<Option<String>>("name")?
      .ok_or_else(|| LuaError::external("config must return a table with a 'name' string"))?;
    validate_stack_name(&name)?;

    let setup: LuaFunction = config
      .get::<Option<LuaFunction>>("setup")?
      .ok_or_else(|| LuaError::external("config must return a table with a 'setup' function"))?;

    info!(stack = %name, path = %path.display(), "evaluating config");
    builder = Rc::new(RefCell::new(StackBuilder::new(name)));
    setup
      .call::<()>(LuaStack::new(builder.clone()))
      .map_err(EvalError::from_lua)?;
  }

  let builder = Rc::try_unwrap(builder)
    .map(RefCell::into_inner)
    .unwrap_or_else(|rc| rc.borrow().clone());
  let stack = builder.build();
  debug!(
    stack = %stack.name,
    resources = stack.nodes.len(),
    grants = stack.grants.len(),
    "config evaluated"
  );
  Ok(stack)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grant::Access;
  use crate::resource::{ResourceKind, Value};
  use std::fs;
  use tempfile::TempDir;

  fn write_config(content: &str) -> (TempDir, std::path::PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("stack.lua");
    fs::write(&path, content).unwrap();
    (temp_dir, path)
  }

  #[test]
  fn evaluates_empty_setup() -> Result<(), EvalError> {
    let (_dir, path) = write_config(
      r#"
        return {
          name = "empty",
          setup = function(stack) end,
        }
      "#,
    );

    let stack = evaluate_config(&path)?;
    assert_eq!(stack.name, "empty");
    assert!(stack.nodes.is_empty());
    assert!(stack.grants.is_empty());
    Ok(())
  }

  #[test]
  fn evaluates_resources_and_grants() -> Result<(), EvalError> {
    let (_dir, path) = write_config(
      r#"
        return {
          name = "notify",
          setup = function(stack)
            local b = stack:bucket("B", {})
            local u = stack:user("U", { name = "deployer" })
            stack:grant_write(b, u)
          end,
        }
      "#,
    );

    let stack = evaluate_config(&path)?;
    assert_eq!(stack.nodes.len(), 2);
    assert_eq!(stack.get("U").unwrap().kind, ResourceKind::User);
    assert_eq!(stack.get("U").unwrap().properties["name"], Value::from("deployer"));
    assert_eq!(stack.grants.len(), 1);
    assert_eq!(stack.grants[0].access, Access::Write);
    Ok(())
  }

  #[test]
  fn duplicate_id_is_a_config_error() {
    let (_dir, path) = write_config(
      r#"
        return {
          name = "dup",
          setup = function(stack)
            stack:bucket("a", {})
            stack:bucket("a", {})
          end,
        }
      "#,
    );

    let err = evaluate_config(&path).unwrap_err();
    assert!(matches!(err, EvalError::Config(ConfigError::DuplicateId(ref id)) if id == "a"));
  }

  #[test]
  fn function_without_artifact_is_a_config_error() {
    let (_dir, path) = write_config(
      r#"
        return {
          name = "fn",
          setup = function(stack)
            stack:func("notifier", { handler = "index.handler" })
          end,
        }
      "#,
    );

    let err = evaluate_config(&path).unwrap_err();
    assert!(matches!(
      err,
      EvalError::Config(ConfigError::InvalidProperty { ref property, .. }) if property == "artifact"
    ));
  }

  #[test]
  fn missing_setup_is_rejected() {
    let (_dir, path) = write_config(r#"return { name = "x" }"#);
    let err = evaluate_config(&path).unwrap_err();
    assert!(err.to_string().contains("setup"));
  }

  #[test]
  fn missing_name_is_rejected() {
    let (_dir, path) = write_config(r#"return { setup = function(stack) end }"#);
    let err = evaluate_config(&path).unwrap_err();
    assert!(err.to_string().contains("name"));
  }

  #[test]
  fn invalid_name_is_rejected() {
    let (_dir, path) = write_config(r#"return { name = "../etc", setup = function(stack) end }"#);
    let err = evaluate_config(&path).unwrap_err();
    assert!(matches!(err, EvalError::Config(ConfigError::InvalidProperty { .. })));
  }

  #[test]
  fn non_table_config_is_rejected() {
    let (_dir, path) = write_config("return 42");
    assert!(matches!(evaluate_config(&path), Err(EvalError::Lua(_))));
  }

  #[test]
  fn lua_runtime_errors_are_reported() {
    let (_dir, path) = write_config(
      r#"
        return {
          name = "boom",
          setup = function(stack) error("boom") end,
        }
      "#,
    );
    let err = evaluate_config(&path).unwrap_err();
    assert!(matches!(err, EvalError::Lua(_)));
    assert!(err.to_string().contains("boom"));
  }
}
