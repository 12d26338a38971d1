/*!
 * Contained Path Handling
 * Lexical joining under a root plus a canonical containment check against symlink escapes
 */

use path_clean::PathClean;
use std::path::{Component, Path, PathBuf};

/// Join `relative` under `root`, rejecting any component that could climb out.
///
/// Returns `None` for `..`, absolute paths and drive prefixes. `.` components
/// are dropped. An empty relative path resolves to the root itself.
pub fn join_relative(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut joined = root.to_path_buf();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(name) => joined.push(name),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    Some(joined.clean())
}

/// Nearest ancestor of `path` (itself included) that exists on disk.
///
/// Uses `symlink_metadata` so a dangling link counts as existing and is then
/// rejected by canonicalization instead of being written through.
fn nearest_existing(path: &Path) -> Option<&Path> {
    path.ancestors().find(|p| p.symlink_metadata().is_ok())
}

/// Check that `candidate` cannot escape `root` through symlinks.
///
/// A root that does not exist yet has nothing under it that could link out,
/// so the lexical check from [`join_relative`] is sufficient.
pub fn is_contained(root: &Path, candidate: &Path) -> bool {
    let Ok(canonical_root) = root.canonicalize() else {
        return true;
    };

    match nearest_existing(candidate) {
        Some(existing) => match existing.canonicalize() {
            Ok(canonical) => canonical.starts_with(&canonical_root),
            Err(_) => false,
        },
        None => true,
    }
}
