/*!
 * Path Namespace Resolver
 * Maps `<namespace>:<relative-path>` addresses onto physical roots under access and phase rules
 */

use super::path::{is_contained, join_relative};
use super::types::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One namespace's physical root and rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceBinding {
    root: PathBuf,
    mode: AccessMode,
    phase: Option<HookPhase>,
}

impl NamespaceBinding {
    pub fn new(root: impl Into<PathBuf>, mode: AccessMode) -> Self {
        Self {
            root: root.into(),
            mode,
            phase: None,
        }
    }

    /// Restrict the namespace to a single phase
    pub fn only_in(mut self, phase: HookPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn phase(&self) -> Option<HookPhase> {
        self.phase
    }
}

/// Physical roots for every namespace, fixed for the lifetime of a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRoots {
    pub cache: PathBuf,
    pub project: PathBuf,
    pub temp: PathBuf,
    pub generated: PathBuf,
    pub built: PathBuf,
}

/// Resolves script addresses into physical paths.
///
/// Pure with respect to its inputs: it inspects filesystem metadata for the
/// symlink containment check but never creates or modifies anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceResolver {
    bindings: [NamespaceBinding; 5],
}

impl NamespaceResolver {
    /// Standard bindings: `project` read-only, `built` post-build only
    pub fn new(roots: NamespaceRoots) -> Self {
        Self {
            bindings: [
                NamespaceBinding::new(roots.cache, AccessMode::ReadWrite),
                NamespaceBinding::new(roots.project, AccessMode::ReadOnly),
                NamespaceBinding::new(roots.temp, AccessMode::ReadWrite),
                NamespaceBinding::new(roots.generated, AccessMode::ReadWrite),
                NamespaceBinding::new(roots.built, AccessMode::ReadWrite).only_in(HookPhase::Post),
            ],
        }
    }

    /// Copy of this resolver with one namespace re-rooted, rules unchanged
    pub fn with_root(&self, namespace: Namespace, root: impl Into<PathBuf>) -> Self {
        let mut resolver = self.clone();
        resolver.bindings[namespace.index()].root = root.into();
        resolver
    }

    pub fn binding(&self, namespace: Namespace) -> &NamespaceBinding {
        &self.bindings[namespace.index()]
    }

    /// Resolve a relative path inside `namespace`
    pub fn resolve(
        &self,
        namespace: Namespace,
        relative: &str,
        access: Access,
        phase: HookPhase,
    ) -> NamespaceResult<PathBuf> {
        let binding = self.binding(namespace);

        if let Some(allowed) = binding.phase() {
            if allowed != phase {
                debug!(%namespace, %phase, "namespace not reachable in this phase");
                return Err(NamespaceError::PhaseRestricted {
                    namespace,
                    phase,
                    allowed,
                });
            }
        }

        if !binding.mode().permits(access) {
            debug!(%namespace, ?access, "write to read-only namespace denied");
            return Err(NamespaceError::AccessDenied { namespace });
        }

        let traversal = || NamespaceError::TraversalDenied(format!("{}:{}", namespace, relative));

        let resolved = join_relative(&binding.root, relative).ok_or_else(traversal)?;
        if !is_contained(&binding.root, &resolved) {
            debug!(%namespace, path = relative, "resolved path escapes namespace root");
            return Err(traversal());
        }

        Ok(resolved)
    }

    /// Resolve a full `<namespace>:<relative-path>` address
    pub fn resolve_address(
        &self,
        address: &str,
        access: Access,
        phase: HookPhase,
    ) -> NamespaceResult<PathBuf> {
        let (namespace, relative) = parse_address(address)?;
        self.resolve(namespace, relative, access, phase)
    }
}

/// Split an address into its namespace and relative part
pub fn parse_address(address: &str) -> NamespaceResult<(Namespace, &str)> {
    let (prefix, relative) = address
        .split_once(':')
        .ok_or_else(|| NamespaceError::InvalidPrefix(address.to_string()))?;

    let namespace = prefix
        .parse::<Namespace>()
        .map_err(|_| NamespaceError::InvalidPrefix(address.to_string()))?;

    Ok((namespace, relative))
}
