/*!
 * print Capability
 * Routes script output to the tracing pipeline instead of stdout
 */

use crate::sandbox::registry::CapabilityContext;
use mlua::{Function, Lua, MultiValue, Result as LuaResult, Value};
use std::sync::Arc;
use tracing::info;

pub(crate) fn open(lua: &Lua, context: &Arc<CapabilityContext>) -> LuaResult<Option<Value>> {
    let ctx = Arc::clone(context);
    let hook = context.hook.clone();
    let phase = context.phase;

    let print = lua.create_function(move |lua, args: MultiValue| {
        ctx.ensure_running()?;
        let tostring: Function = lua.globals().get("tostring")?;
        let mut parts = Vec::with_capacity(args.len());
        for value in args {
            parts.push(tostring.call::<mlua::String>(value)?.to_string_lossy());
        }
        info!(target: "hook", %phase, hook = %hook, "{}", parts.join("\t"));
        Ok(())
    })?;

    Ok(Some(Value::Function(print)))
}
