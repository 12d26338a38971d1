/*!
 * Sandbox Runtime
 * One isolated, single-use Lua state per hook invocation
 */

use super::exit::ExitSignal;
use super::registry::{CapabilityContext, CapabilityRegistry};
use crate::hooks::ExecutionOutcome;
use mlua::{ChunkMode, Function, HookTriggers, Lua, LuaOptions, StdLib, VmState};
use miette::Diagnostic;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Runtime setup result
#[must_use = "sandbox setup can fail and must be handled"]
pub type SandboxResult<T> = Result<T, SandboxError>;

#[derive(Error, Debug, Diagnostic)]
pub enum SandboxError {
    #[error("could not prepare sandbox: {0}")]
    #[diagnostic(code(sandbox::setup))]
    Setup(#[from] mlua::Error),
}

/// Base-library globals that reach the host filesystem or load arbitrary chunks
const REMOVED_GLOBALS: [&str; 4] = ["dofile", "loadfile", "load", "require"];

/// Instructions between two checks for a pending exit
const EXIT_CHECK_INTERVAL: u32 = 1000;

/// Makes every protected call re-raise once an exit was requested, so a script
/// cannot swallow its own `os.exit`. Coroutines are refused outright after an
/// exit; the instruction hook does not reach them.
const EXIT_GUARD: &str = r#"
local exiting, checkpoint = ...
local raw_pcall, raw_xpcall, raw_error = pcall, xpcall, error
local raw_create, raw_resume, raw_close = coroutine.create, coroutine.resume, coroutine.close

local function settle(ok, ...)
    if not ok and exiting() then
        raw_error((...), 0)
    end
    return ok, ...
end

pcall = function(f, ...)
    return settle(raw_pcall(f, ...))
end

xpcall = function(f, handler, ...)
    local guarded = function(err)
        if exiting() then
            return err
        end
        return handler(err)
    end
    return settle(raw_xpcall(f, guarded, ...))
end

coroutine.resume = function(co, ...)
    checkpoint()
    return settle(raw_resume(co, ...))
end

coroutine.close = function(co)
    checkpoint()
    return raw_close(co)
end

local function unwrap(co, ok, ...)
    if ok then
        return ...
    end
    local err = ...
    if exiting() then
        raw_error(err, 0)
    end
    raw_close(co)
    if type(err) == "string" then
        raw_error(err, 2)
    end
    raw_error(err, 0)
end

coroutine.wrap = function(f)
    local co = raw_create(f)
    return function(...)
        checkpoint()
        return unwrap(co, raw_resume(co, ...))
    end
end
"#;

/// A prepared Lua state bound to one hook invocation
pub struct SandboxRuntime {
    lua: Lua,
    hook: String,
    exit: Arc<ExitSignal>,
}

impl SandboxRuntime {
    /// Build a fresh state with the restricted standard library and the
    /// registry's capabilities installed
    pub fn new(context: CapabilityContext, registry: &CapabilityRegistry) -> SandboxResult<Self> {
        let libs = StdLib::TABLE
            | StdLib::STRING
            | StdLib::MATH
            | StdLib::UTF8
            | StdLib::COROUTINE
            | StdLib::OS;
        let lua = Lua::new_with(libs, LuaOptions::default())?;

        let globals = lua.globals();
        for name in REMOVED_GLOBALS {
            globals.set(name, mlua::Value::Nil)?;
        }

        let hook = context.hook.clone();
        let exit = Arc::clone(&context.exit);
        let context = Arc::new(context);

        // the standard os table is only read by the os capability, never exposed
        registry.install(&lua, &context)?;
        if !registry.contains("os") {
            globals.set("os", mlua::Value::Nil)?;
        }

        let signal = Arc::clone(&exit);
        let exiting: Function = lua.create_function(move |_, ()| Ok(signal.is_requested()))?;
        let signal = Arc::clone(&exit);
        let checkpoint: Function = lua.create_function(move |_, ()| raise_pending(&signal))?;
        lua.load(EXIT_GUARD)
            .set_name("=exit-guard")
            .set_mode(ChunkMode::Text)
            .call::<()>((exiting, checkpoint))?;

        // close handlers and finalizer fallout still run Lua after the exit unwinds
        let signal = Arc::clone(&exit);
        lua.set_hook(
            HookTriggers::new().every_nth_instruction(EXIT_CHECK_INTERVAL),
            move |_, _| raise_pending(&signal).map(|()| VmState::Continue),
        );

        trace!(%hook, capabilities = ?registry, "sandbox prepared");
        Ok(Self { lua, hook, exit })
    }

    /// Execute the script at `script` and report how it ended.
    ///
    /// An exit requested by the script takes precedence over whatever error
    /// the unwinding produced.
    pub fn run(self, script: &Path) -> ExecutionOutcome {
        let source = match std::fs::read(script) {
            Ok(source) => source,
            Err(e) => {
                return ExecutionOutcome::Completed(Some(format!(
                    "could not read {}: {}",
                    script.display(),
                    e
                )))
            }
        };

        debug!(hook = %self.hook, bytes = source.len(), "executing hook");
        let result = self
            .lua
            .load(source)
            .set_name(format!("@{}", self.hook))
            .set_mode(ChunkMode::Text)
            .exec();

        if let Some(code) = self.exit.code() {
            return ExecutionOutcome::Terminated(code);
        }

        match result {
            Ok(()) => ExecutionOutcome::Completed(None),
            Err(e) => ExecutionOutcome::Completed(Some(e.to_string())),
        }
    }

    /// Evaluate an inline chunk; used by tests to probe the environment
    #[cfg(test)]
    pub(crate) fn eval<R: mlua::FromLuaMulti>(&self, source: &str) -> mlua::Result<R> {
        self.lua.load(source).set_mode(ChunkMode::Text).eval()
    }
}

fn raise_pending(signal: &ExitSignal) -> mlua::Result<()> {
    match signal.pending() {
        Some(requested) => Err(mlua::Error::external(requested)),
        None => Ok(()),
    }
}

impl std::fmt::Debug for SandboxRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxRuntime")
            .field("hook", &self.hook)
            .finish_non_exhaustive()
    }
}
