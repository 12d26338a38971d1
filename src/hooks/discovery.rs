/*!
 * Hook Discovery
 * Scans `<hooks>/pre` and `<hooks>/post` for Lua scripts in execution order
 */

use super::types::*;
use crate::security::HookPhase;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

/// File extension hook scripts must carry
pub const HOOK_EXTENSION: &str = "lua";

/// Discover hooks for both phases.
///
/// Fails only when neither phase directory exists. A missing or empty phase
/// directory yields an empty list once the other one exists.
pub fn discover(hooks_root: &Path) -> DiscoveryResult<HookSet> {
    let pre_dir = hooks_root.join(HookPhase::Pre.dir_name());
    let post_dir = hooks_root.join(HookPhase::Post.dir_name());

    let pre = scan_phase(&pre_dir)?;
    let post = scan_phase(&post_dir)?;

    if pre.is_none() && post.is_none() {
        return Err(DiscoveryError::NotConfigured {
            pre: pre_dir,
            post: post_dir,
        });
    }

    let set = HookSet {
        pre: pre.unwrap_or_default(),
        post: post.unwrap_or_default(),
    };

    info!(
        pre = set.pre.len(),
        post = set.post.len(),
        root = %hooks_root.display(),
        "hooks indexed"
    );

    Ok(set)
}

/// `None` when the directory does not exist
fn scan_phase(dir: &Path) -> DiscoveryResult<Option<Vec<HookDescriptor>>> {
    let io_error = |source| DiscoveryError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(e)),
    };

    let mut hooks = Vec::new();
    for entry in entries {
        let entry = entry.map_err(io_error)?;
        let file_type = entry.file_type().map_err(io_error)?;
        if !file_type.is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension() != Some(OsStr::new(HOOK_EXTENSION)) {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => hooks.push(HookDescriptor::new(name, path)),
            Err(raw) => warn!(name = ?raw, "skipping hook with non UTF-8 file name"),
        }
    }

    // hook authors rely on numeric prefixes (1-setup.lua, 2-check.lua) for ordering
    hooks.sort_by(|a, b| a.name().as_bytes().cmp(b.name().as_bytes()));

    Ok(Some(hooks))
}
