/*!
 * Hook Capabilities
 * Host functions exposed to hook scripts
 *
 * Recoverable failures are returned Lua-style as `nil, message` so scripts
 * can handle them; only an intercepted exit unwinds the script.
 */

pub mod fs;
pub mod http;
pub mod json;
pub mod log;
pub mod os;

use mlua::{IntoLuaMulti, Lua, MultiValue, Result as LuaResult, Value};
use std::fmt::Display;

/// `nil, message`
pub(crate) fn fail(lua: &Lua, error: impl Display) -> LuaResult<MultiValue> {
    (Value::Nil, error.to_string()).into_lua_multi(lua)
}

/// Successful values pass through, errors become `nil, message`
pub(crate) fn reply<T, E>(lua: &Lua, result: Result<T, E>) -> LuaResult<MultiValue>
where
    T: IntoLuaMulti,
    E: Display,
{
    match result {
        Ok(value) => value.into_lua_multi(lua),
        Err(e) => fail(lua, e),
    }
}
