/*!
 * os Capability
 * Time helpers from the standard `os` table plus an intercepted `exit`
 */

use crate::sandbox::exit::ExitRequested;
use crate::sandbox::registry::CapabilityContext;
use mlua::{Lua, Result as LuaResult, Table, Value};
use std::sync::Arc;
use tracing::info;

/// Standard `os` functions that neither touch the host nor the environment
const PASSTHROUGH: [&str; 4] = ["clock", "date", "difftime", "time"];

pub(crate) fn open(lua: &Lua, context: &Arc<CapabilityContext>) -> LuaResult<Option<Value>> {
    let os = lua.create_table()?;

    if let Some(std_os) = lua.globals().get::<Option<Table>>("os")? {
        for name in PASSTHROUGH {
            os.set(name, std_os.get::<Value>(name)?)?;
        }
    }

    let ctx = Arc::clone(context);
    os.set(
        "exit",
        lua.create_function(move |_, code: Value| -> LuaResult<()> {
            let code = exit_code(&code)?;
            if ctx.exit.publish(code) {
                info!(hook = %ctx.hook, code, "hook requested exit");
            }
            // a second exit keeps the first code
            let requested = ctx.exit.pending().unwrap_or(ExitRequested { code });
            Err(mlua::Error::external(requested))
        })?,
    )?;

    Ok(Some(Value::Table(os)))
}

/// `nil`/`true` is success, `false` is failure, numbers must be integral
pub(crate) fn exit_code(value: &Value) -> LuaResult<i32> {
    let invalid = || {
        mlua::Error::RuntimeError(format!(
            "bad argument #1 to 'exit' (integer or boolean expected, got {})",
            value.type_name()
        ))
    };

    match value {
        Value::Nil | Value::Boolean(true) => Ok(0),
        Value::Boolean(false) => Ok(1),
        Value::Integer(n) => i32::try_from(*n).map_err(|_| invalid()),
        Value::Number(n) if n.fract() == 0.0 && *n >= i32::MIN as f64 && *n <= i32::MAX as f64 => {
            Ok(*n as i32)
        }
        _ => Err(invalid()),
    }
}
