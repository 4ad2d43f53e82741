//! The `stack` object passed to a config's `setup` function.
//!
//! `LuaStack` wraps the explicit [`StackBuilder`]; every declaration method
//! returns a [`LuaResourceHandle`] that scripts use to build references and
//! grants.

use std::cell::RefCell;
use std::rc::Rc;

use mlua::prelude::*;

use crate::grant::Access;
use crate::resource::{Reference, ResourceId, ResourceKind};
use crate::stack::{ConfigError, ResourceHandle, StackBuilder};

use super::convert::{lua_to_node_id, lua_to_properties, reference_to_lua};

/// Handle to a declared node, as seen from Lua.
#[derive(Debug, Clone)]
pub struct LuaResourceHandle {
  pub id: ResourceId,
  pub kind: ResourceKind,
}

impl From<ResourceHandle> for LuaResourceHandle {
  fn from(handle: ResourceHandle) -> Self {
    Self {
      id: handle.id,
      kind: handle.kind,
    }
  }
}

impl LuaUserData for LuaResourceHandle {
  fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
    fields.add_field_method_get("id", |_, this| Ok(this.id.clone()));
    fields.add_field_method_get("kind", |_, this| Ok(this.kind.as_str()));
  }

  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    methods.add_method("ref", |lua, this, attribute: String| {
      reference_to_lua(lua, &Reference::new(this.id.clone(), attribute))
    });
    methods.add_method("arn", |lua, this, ()| {
      reference_to_lua(lua, &Reference::new(this.id.clone(), "arn"))
    });
    methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| {
      Ok(format!("{}({})", this.kind, this.id))
    });
  }
}

/// Shared builder handed to `setup(stack)`.
#[derive(Debug, Clone)]
pub struct LuaStack(pub Rc<RefCell<StackBuilder>>);

impl LuaStack {
  pub fn new(builder: Rc<RefCell<StackBuilder>>) -> Self {
    Self(builder)
  }

  fn declare(&self, kind: ResourceKind, id: String, props: Option<LuaTable>) -> LuaResult<LuaResourceHandle> {
    let (properties, depends_on) = lua_to_properties(props)?;
    let mut builder = self.0.borrow_mut();
    let handle = builder.resource(kind, id, properties).map_err(LuaError::external)?;
    for target in depends_on {
      builder.depends_on(&handle.id, target).map_err(LuaError::external)?;
    }
    Ok(handle.into())
  }

  fn grant(&self, resource: LuaValue, principal: LuaValue, access: Access) -> LuaResult<()> {
    let resource = lua_to_node_id(resource)?;
    let principal = lua_to_node_id(principal)?;
    self.0.borrow_mut().grant(resource, principal, access);
    Ok(())
  }
}

fn parse_access(access: &str) -> LuaResult<Access> {
  match access.to_ascii_lowercase().as_str() {
    "read" => Ok(Access::Read),
    "write" => Ok(Access::Write),
    "read_write" | "readwrite" | "rw" => Ok(Access::ReadWrite),
    other => Err(LuaError::external(format!(
      "unknown access '{other}' (expected read, write or read_write)"
    ))),
  }
}

fn add_kind_method<M: LuaUserDataMethods<LuaStack>>(methods: &mut M, name: &'static str, kind: ResourceKind) {
  methods.add_method(name, move |_, this, (id, props): (String, Option<LuaTable>)| {
    this.declare(kind, id, props)
  });
}

impl LuaUserData for LuaStack {
  fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
    fields.add_field_method_get("name", |_, this| Ok(this.0.borrow().name().to_string()));
  }

  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    add_kind_method(methods, "bucket", ResourceKind::Bucket);
    add_kind_method(methods, "func", ResourceKind::Function);
    add_kind_method(methods, "user", ResourceKind::User);
    add_kind_method(methods, "role", ResourceKind::Role);
    add_kind_method(methods, "policy", ResourceKind::Policy);
    add_kind_method(methods, "rule", ResourceKind::Rule);

    methods.add_method(
      "resource",
      |_, this, (kind, id, props): (String, String, Option<LuaTable>)| {
        let kind: ResourceKind = kind.parse().map_err(LuaError::external)?;
        this.declare(kind, id, props)
      },
    );

    methods.add_method("ref", |lua, _, (id, attribute): (String, Option<String>)| {
      reference_to_lua(lua, &Reference::new(id, attribute.unwrap_or_else(|| "id".to_string())))
    });

    methods.add_method(
      "grant",
      |_, this, (resource, principal, access): (LuaValue, LuaValue, String)| {
        this.grant(resource, principal, parse_access(&access)?)
      },
    );
    methods.add_method("grant_read", |_, this, (resource, principal): (LuaValue, LuaValue)| {
      this.grant(resource, principal, Access::Read)
    });
    methods.add_method("grant_write", |_, this, (resource, principal): (LuaValue, LuaValue)| {
      this.grant(resource, principal, Access::Write)
    });
    methods.add_method(
      "grant_read_write",
      |_, this, (resource, principal): (LuaValue, LuaValue)| this.grant(resource, principal, Access::ReadWrite),
    );
  }
}

/// Find a [`ConfigError`] raised inside a Lua callback.
pub fn config_error(err: &LuaError) -> Option<ConfigError> {
  match err {
    LuaError::CallbackError { cause, .. } => config_error(cause),
    LuaError::WithContext { cause, .. } => config_error(cause),
    LuaError::ExternalError(inner) => inner.downcast_ref::<ConfigError>().cloned(),
    _ => None,
  }
}
