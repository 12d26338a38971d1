/*!
 * fs Capability
 * File access through `<namespace>:<relative-path>` addresses only
 */

use super::{fail, reply};
use crate::sandbox::registry::CapabilityContext;
use crate::security::{Access, HookPhase, NamespaceError, NamespaceResolver};
use mlua::{IntoLuaMulti, Lua, Result as LuaResult, Value};
use path_clean::PathClean;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Filesystem failures surfaced to scripts
#[derive(Error, Debug)]
pub enum FsError {
    #[error(transparent)]
    Namespace(#[from] NamespaceError),

    #[error("{address}: {source}")]
    Io {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("refusing to remove namespace root {0}")]
    RootRemoval(String),
}

pub type FsResult<T> = Result<T, FsError>;

/// One directory entry as seen by a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Namespaced file operations for one phase
#[derive(Debug, Clone)]
pub struct ScopedFs {
    resolver: Arc<NamespaceResolver>,
    phase: HookPhase,
}

impl ScopedFs {
    pub fn new(resolver: Arc<NamespaceResolver>, phase: HookPhase) -> Self {
        Self { resolver, phase }
    }

    fn resolve(&self, address: &str, access: Access) -> FsResult<PathBuf> {
        Ok(self.resolver.resolve_address(address, access, self.phase)?)
    }

    fn io(address: &str) -> impl FnOnce(io::Error) -> FsError + '_ {
        move |source| FsError::Io {
            address: address.to_string(),
            source,
        }
    }

    pub fn read(&self, address: &str) -> FsResult<Vec<u8>> {
        let path = self.resolve(address, Access::Read)?;
        std::fs::read(&path).map_err(Self::io(address))
    }

    /// Write `data`, creating missing parent directories
    pub fn write(&self, address: &str, data: &[u8]) -> FsResult<()> {
        let path = self.resolve(address, Access::Write)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Self::io(address))?;
        }
        std::fs::write(&path, data).map_err(Self::io(address))?;
        debug!(address, bytes = data.len(), "hook wrote file");
        Ok(())
    }

    /// Entries sorted by name
    pub fn list(&self, address: &str) -> FsResult<Vec<DirEntry>> {
        let path = self.resolve(address, Access::Read)?;
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&path).map_err(Self::io(address))? {
            let entry = entry.map_err(Self::io(address))?;
            let is_dir = entry.file_type().map_err(Self::io(address))?.is_dir();
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    pub fn exists(&self, address: &str) -> FsResult<bool> {
        let path = self.resolve(address, Access::Read)?;
        Ok(path.symlink_metadata().is_ok())
    }

    pub fn mkdir(&self, address: &str) -> FsResult<()> {
        let path = self.resolve(address, Access::Write)?;
        std::fs::create_dir_all(&path).map_err(Self::io(address))
    }

    /// Remove a file or a directory tree
    pub fn remove(&self, address: &str) -> FsResult<()> {
        let path = self.resolve(address, Access::Write)?;
        let (namespace, _) = crate::security::parse_address(address)?;
        if path == self.resolver.binding(namespace).root().clean() {
            return Err(FsError::RootRemoval(address.to_string()));
        }

        let meta = path.symlink_metadata().map_err(Self::io(address))?;
        if meta.is_dir() {
            std::fs::remove_dir_all(&path).map_err(Self::io(address))?;
        } else {
            std::fs::remove_file(&path).map_err(Self::io(address))?;
        }
        debug!(address, "hook removed path");
        Ok(())
    }
}

pub(crate) fn open(lua: &Lua, context: &Arc<CapabilityContext>) -> LuaResult<Option<Value>> {
    let fs = lua.create_table()?;
    let scoped = ScopedFs::new(Arc::clone(&context.resolver), context.phase);

    let (ctx, sfs) = (Arc::clone(context), scoped.clone());
    fs.set(
        "read",
        lua.create_function(move |lua, address: String| {
            ctx.ensure_running()?;
            match sfs.read(&address) {
                Ok(bytes) => lua.create_string(&bytes)?.into_lua_multi(lua),
                Err(e) => fail(lua, e),
            }
        })?,
    )?;

    let (ctx, sfs) = (Arc::clone(context), scoped.clone());
    fs.set(
        "write",
        lua.create_function(move |lua, (address, data): (String, mlua::String)| {
            ctx.ensure_running()?;
            let data = data.as_bytes().to_vec();
            reply(lua, sfs.write(&address, &data).map(|()| true))
        })?,
    )?;

    let (ctx, sfs) = (Arc::clone(context), scoped.clone());
    fs.set(
        "list",
        lua.create_function(move |lua, address: String| {
            ctx.ensure_running()?;
            let entries = match sfs.list(&address) {
                Ok(entries) => entries,
                Err(e) => return fail(lua, e),
            };
            let table = lua.create_table_with_capacity(entries.len(), 0)?;
            for entry in entries {
                let item = lua.create_table()?;
                item.set("name", entry.name)?;
                item.set("isDir", entry.is_dir)?;
                table.push(item)?;
            }
            table.into_lua_multi(lua)
        })?,
    )?;

    let (ctx, sfs) = (Arc::clone(context), scoped.clone());
    fs.set(
        "exists",
        lua.create_function(move |lua, address: String| {
            ctx.ensure_running()?;
            reply(lua, sfs.exists(&address))
        })?,
    )?;

    let (ctx, sfs) = (Arc::clone(context), scoped.clone());
    fs.set(
        "mkdir",
        lua.create_function(move |lua, address: String| {
            ctx.ensure_running()?;
            reply(lua, sfs.mkdir(&address).map(|()| true))
        })?,
    )?;

    let (ctx, sfs) = (Arc::clone(context), scoped);
    fs.set(
        "remove",
        lua.create_function(move |lua, address: String| {
            ctx.ensure_running()?;
            reply(lua, sfs.remove(&address).map(|()| true))
        })?,
    )?;

    Ok(Some(Value::Table(fs)))
}
