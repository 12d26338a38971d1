/*!
 * Capability Registry
 * Named factories that install host capabilities into a fresh Lua state
 */

use super::capabilities;
use super::exit::ExitSignal;
use super::transport::NetworkAccess;
use crate::security::{HookPhase, NamespaceResolver};
use mlua::{Lua, Result as LuaResult, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// Everything a capability may close over for one hook invocation
#[derive(Debug, Clone)]
pub struct CapabilityContext {
    pub hook: String,
    pub phase: HookPhase,
    pub resolver: Arc<NamespaceResolver>,
    /// `None` keeps the `http` capability out of the state entirely
    pub network: Option<NetworkAccess>,
    pub exit: Arc<ExitSignal>,
}

impl CapabilityContext {
    /// Refuse service once the script asked to exit
    pub fn ensure_running(&self) -> LuaResult<()> {
        match self.exit.pending() {
            Some(requested) => Err(mlua::Error::external(requested)),
            None => Ok(()),
        }
    }
}

/// Builds the global value for one capability; `None` skips installation
pub type CapabilityFactory = fn(&Lua, &Arc<CapabilityContext>) -> LuaResult<Option<Value>>;

/// Capability set installed as globals, in name order
#[derive(Clone)]
pub struct CapabilityRegistry {
    factories: BTreeMap<&'static str, CapabilityFactory>,
}

impl CapabilityRegistry {
    /// Registry without any capabilities
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// `fs`, `http`, `json`, `os` and `print`
    pub fn standard() -> Self {
        Self::empty()
            .with("fs", capabilities::fs::open)
            .with("http", capabilities::http::open)
            .with("json", capabilities::json::open)
            .with("os", capabilities::os::open)
            .with("print", capabilities::log::open)
    }

    /// Add or replace a capability
    pub fn with(mut self, name: &'static str, factory: CapabilityFactory) -> Self {
        self.factories.insert(name, factory);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Install every capability as a global of `lua`
    pub fn install(&self, lua: &Lua, context: &Arc<CapabilityContext>) -> LuaResult<()> {
        let globals = lua.globals();
        for (name, factory) in &self.factories {
            match factory(lua, context)? {
                Some(value) => {
                    globals.set(*name, value)?;
                    trace!(hook = %context.hook, capability = name, "capability installed");
                }
                None => trace!(hook = %context.hook, capability = name, "capability skipped"),
            }
        }
        Ok(())
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
