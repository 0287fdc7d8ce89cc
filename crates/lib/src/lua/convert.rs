//! Conversion between Lua values and JSON values.
//!
//! Templates, user data and context are JSON on the Rust side; stack
//! definitions see them as plain Lua tables.

use mlua::prelude::*;
use serde_json::{Map, Number, Value};

/// Convert a Lua value into JSON.
///
/// A table with a non-empty `1..n` sequence becomes an array, any other table
/// an object. Functions and userdata cannot be represented and are rejected.
pub fn lua_to_json(value: LuaValue) -> LuaResult<Value> {
  match value {
    LuaValue::Nil => Ok(Value::Null),
    LuaValue::Boolean(b) => Ok(Value::Bool(b)),
    LuaValue::Integer(i) => Ok(Value::Number(i.into())),
    LuaValue::Number(n) => Number::from_f64(n)
      .map(Value::Number)
      .ok_or_else(|| LuaError::external(format!("number {} cannot be represented in a template", n))),
    LuaValue::String(s) => Ok(Value::String(s.to_str()?.to_string())),
    LuaValue::Table(t) => {
      let len = t.raw_len();
      if len > 0 {
        let mut arr = Vec::with_capacity(len);
        for i in 1..=len {
          arr.push(lua_to_json(t.raw_get(i)?)?);
        }
        return Ok(Value::Array(arr));
      }

      let mut map = Map::new();
      for pair in t.pairs::<LuaValue, LuaValue>() {
        let (k, v) = pair?;
        let key = match k {
          LuaValue::String(s) => s.to_str()?.to_string(),
          LuaValue::Integer(i) => i.to_string(),
          other => {
            return Err(LuaError::external(format!(
              "table keys must be strings, got {}",
              other.type_name()
            )));
          }
        };
        map.insert(key, lua_to_json(v)?);
      }
      Ok(Value::Object(map))
    }
    other => Err(LuaError::external(format!(
      "unsupported value type: {}",
      other.type_name()
    ))),
  }
}

/// Convert a JSON value into a Lua value. `null` becomes `nil`.
pub fn json_to_lua(lua: &Lua, value: &Value) -> LuaResult<LuaValue> {
  match value {
    Value::Null => Ok(LuaValue::Nil),
    Value::Bool(b) => Ok(LuaValue::Boolean(*b)),
    Value::Number(n) => match n.as_i64() {
      Some(i) => Ok(LuaValue::Integer(i)),
      None => Ok(LuaValue::Number(n.as_f64().unwrap_or(f64::NAN))),
    },
    Value::String(s) => Ok(LuaValue::String(lua.create_string(s)?)),
    Value::Array(arr) => {
      let table = lua.create_table_with_capacity(arr.len(), 0)?;
      for (i, val) in arr.iter().enumerate() {
        table.raw_set(i + 1, json_to_lua(lua, val)?)?;
      }
      Ok(LuaValue::Table(table))
    }
    Value::Object(map) => {
      let table = lua.create_table_with_capacity(0, map.len())?;
      for (k, v) in map {
        table.raw_set(k.as_str(), json_to_lua(lua, v)?)?;
      }
      Ok(LuaValue::Table(table))
    }
  }
}
