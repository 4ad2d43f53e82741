//! Conversion between Lua values and resource property values.

use std::collections::BTreeMap;

use mlua::prelude::*;

use crate::consts::RESOURCE_REF_TYPE;
use crate::resource::{Properties, Reference, ResourceId, Value};

use super::stack::LuaResourceHandle;

/// Property key holding explicit dependencies.
pub const DEPENDS_ON_KEY: &str = "depends_on";

/// Build a reference table `{ target, attribute }` marked with `__type`.
pub fn reference_to_lua(lua: &Lua, reference: &Reference) -> LuaResult<LuaTable> {
  let table = lua.create_table()?;
  table.set("target", reference.target.as_str())?;
  table.set("attribute", reference.attribute.as_str())?;

  let mt = lua.create_table()?;
  mt.set("__type", RESOURCE_REF_TYPE)?;
  let display = reference.to_string();
  mt.set(
    "__tostring",
    lua.create_function(move |_, _: LuaValue| Ok(display.clone()))?,
  )?;
  table.set_metatable(Some(mt))?;
  Ok(table)
}

fn is_reference_table(t: &LuaTable) -> bool {
  t.metatable()
    .and_then(|mt| mt.get::<String>("__type").ok())
    .is_some_and(|ty| ty == RESOURCE_REF_TYPE)
}

/// Convert a Lua value into a property value.
///
/// Reference tables become `Value::Reference`; a resource handle used as a
/// value is a reference to its `id`. Arrays (sequential keys from 1) become
/// lists and string-keyed tables become maps. Sparse arrays and tables mixing
/// both are rejected.
pub fn lua_to_value(value: LuaValue) -> LuaResult<Value> {
  match value {
    LuaValue::Nil => Ok(Value::Null),
    LuaValue::Boolean(b) => Ok(Value::Bool(b)),
    LuaValue::Integer(i) => Ok(Value::Number(i as f64)),
    LuaValue::Number(n) => Ok(Value::Number(n)),
    LuaValue::String(s) => Ok(Value::String(s.to_str()?.to_string())),
    LuaValue::UserData(ud) => {
      let handle = ud
        .borrow::<LuaResourceHandle>()
        .map_err(|_| LuaError::external("unsupported userdata in resource properties"))?;
      Ok(Value::reference(handle.id.clone(), "id"))
    }
    LuaValue::Table(t) => {
      if is_reference_table(&t) {
        let target: String = t.get("target")?;
        let attribute: String = t.get("attribute")?;
        return Ok(Value::reference(target, attribute));
      }

      let mut indexed = BTreeMap::new();
      let mut named = BTreeMap::new();
      for pair in t.pairs::<LuaValue, LuaValue>() {
        let (key, v) = pair?;
        match key {
          LuaValue::Integer(i) => {
            indexed.insert(i, lua_to_value(v)?);
          }
          LuaValue::String(k) => {
            named.insert(k.to_str()?.to_string(), lua_to_value(v)?);
          }
          other => {
            return Err(LuaError::external(format!(
              "unsupported table key type '{}' in resource properties",
              other.type_name()
            )));
          }
        }
      }

      match (indexed.is_empty(), named.is_empty()) {
        (true, _) => Ok(Value::Map(named)),
        (false, true) if indexed.keys().copied().eq(1..=indexed.len() as i64) => {
          Ok(Value::List(indexed.into_values().collect()))
        }
        (false, true) => Err(LuaError::external("array tables must be indexed 1..n without gaps")),
        (false, false) => Err(LuaError::external("table mixes array items with named keys")),
      }
    }
    other => Err(LuaError::external(format!(
      "unsupported value type in resource properties: {}",
      other.type_name()
    ))),
  }
}

/// Resolve something naming a node: an id string, a handle or a reference.
pub fn lua_to_node_id(value: LuaValue) -> LuaResult<ResourceId> {
  match value {
    LuaValue::String(s) => Ok(s.to_str()?.to_string()),
    LuaValue::UserData(ud) => {
      let handle = ud
        .borrow::<LuaResourceHandle>()
        .map_err(|_| LuaError::external("expected a resource handle"))?;
      Ok(handle.id.clone())
    }
    LuaValue::Table(t) if is_reference_table(&t) => t.get("target"),
    other => Err(LuaError::external(format!(
      "expected a resource id or handle, got {}",
      other.type_name()
    ))),
  }
}

/// Split a props table into properties and explicit `depends_on` ids.
pub fn lua_to_properties(props: Option<LuaTable>) -> LuaResult<(Properties, Vec<ResourceId>)> {
  let mut properties = Properties::new();
  let mut depends_on = Vec::new();
  let Some(props) = props else {
    return Ok((properties, depends_on));
  };

  for pair in props.pairs::<String, LuaValue>() {
    let (key, value) = pair?;
    if key == DEPENDS_ON_KEY {
      match value {
        LuaValue::Table(t) if !is_reference_table(&t) => {
          for item in t.sequence_values::<LuaValue>() {
            depends_on.push(lua_to_node_id(item?)?);
          }
        }
        other => depends_on.push(lua_to_node_id(other)?),
      }
      continue;
    }
    properties.insert(key, lua_to_value(value)?);
  }

  Ok((properties, depends_on))
}
