/*!
 * json Capability
 */

use super::reply;
use crate::sandbox::registry::CapabilityContext;
use mlua::{Lua, LuaSerdeExt, Result as LuaResult, Value};
use std::sync::Arc;

pub(crate) fn open(lua: &Lua, _context: &Arc<CapabilityContext>) -> LuaResult<Option<Value>> {
    let json = lua.create_table()?;

    json.set(
        "encode",
        lua.create_function(|lua, (value, pretty): (Value, Option<bool>)| {
            let encoded = if pretty.unwrap_or(false) {
                serde_json::to_string_pretty(&value)
            } else {
                serde_json::to_string(&value)
            };
            reply(lua, encoded)
        })?,
    )?;

    json.set(
        "decode",
        lua.create_function(|lua, text: mlua::String| {
            let decoded = serde_json::from_slice::<serde_json::Value>(&text.as_bytes());
            match decoded {
                Ok(value) => reply(lua, Ok::<_, String>(lua.to_value(&value)?)),
                Err(e) => reply(lua, Err::<Value, _>(e)),
            }
        })?,
    )?;

    // sentinel so scripts can produce and recognise JSON null
    json.set("null", lua.null())?;

    Ok(Some(Value::Table(json)))
}
