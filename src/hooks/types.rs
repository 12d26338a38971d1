/*!
 * Hook Types
 * Descriptors, phase sets, execution outcomes and hook errors
 */

use crate::security::HookPhase;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Hook operation result
///
/// # Must Use
/// A failed hook must abort the remainder of its phase
#[must_use = "hook failures must abort the phase"]
pub type HookResult<T> = Result<T, HookError>;

/// Discovery result
#[must_use = "discovery can fail and must be handled"]
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// A discovered hook script
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookDescriptor {
    name: String,
    path: PathBuf,
}

impl HookDescriptor {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// File name, used for ordering and error reporting
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Ordered hooks for both phases, built once per build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookSet {
    pub pre: Vec<HookDescriptor>,
    pub post: Vec<HookDescriptor>,
}

impl HookSet {
    pub fn phase(&self, phase: HookPhase) -> &[HookDescriptor] {
        match phase {
            HookPhase::Pre => &self.pre,
            HookPhase::Post => &self.post,
        }
    }

    pub fn len(&self) -> usize {
        self.pre.len() + self.post.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }
}

/// How a single hook invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The script returned; `Some` carries the fault text
    Completed(Option<String>),
    /// The script called `os.exit` with this code
    Terminated(i32),
}

impl ExecutionOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ExecutionOutcome::Completed(None) | ExecutionOutcome::Terminated(0)
        )
    }
}

/// Per-hook lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookState {
    Idle,
    Running,
    Completed,
    Terminated,
}

impl HookState {
    pub fn is_final(self) -> bool {
        matches!(self, HookState::Completed | HookState::Terminated)
    }
}

impl fmt::Display for HookState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HookState::Idle => "idle",
            HookState::Running => "running",
            HookState::Completed => "completed",
            HookState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Why a hook failed
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "details")]
pub enum HookFailure {
    #[error("exited with failure")]
    ExitedWithFailure,

    #[error("exited with code {0}")]
    ExitedWithCode(i32),

    #[error("failed\n{0}")]
    Fault(String),

    #[error("could not be started: {0}")]
    Setup(String),

    #[error("worker panicked")]
    WorkerPanicked,
}

/// A phase failure naming the offending hook
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[error("{phase} hook {hook} {reason}")]
#[diagnostic(
    code(hooks::failed),
    help("Remaining hooks of this phase were skipped; files written by earlier hooks are kept.")
)]
pub struct HookError {
    pub phase: HookPhase,
    pub hook: String,
    pub reason: HookFailure,
}

impl HookError {
    pub fn new(phase: HookPhase, hook: impl Into<String>, reason: HookFailure) -> Self {
        Self {
            phase,
            hook: hook.into(),
            reason,
        }
    }

    /// Map a non-successful outcome to a failure, `None` when the hook succeeded
    pub fn from_outcome(phase: HookPhase, hook: &str, outcome: ExecutionOutcome) -> Option<Self> {
        let reason = match outcome {
            ExecutionOutcome::Completed(None) | ExecutionOutcome::Terminated(0) => return None,
            ExecutionOutcome::Terminated(1) => HookFailure::ExitedWithFailure,
            ExecutionOutcome::Terminated(code) => HookFailure::ExitedWithCode(code),
            ExecutionOutcome::Completed(Some(fault)) => HookFailure::Fault(fault),
        };
        Some(Self::new(phase, hook, reason))
    }
}

/// Hook discovery errors
#[derive(Error, Debug, Diagnostic)]
pub enum DiscoveryError {
    #[error("no hooks found, neither {pre:?} nor {post:?} exist")]
    #[diagnostic(
        code(hooks::not_configured),
        help("Create a `pre` and/or `post` directory under the hooks path, or disable hooks.")
    )]
    NotConfigured { pre: PathBuf, post: PathBuf },

    #[error("could not scan hooks in {path:?}: {source}")]
    #[diagnostic(code(hooks::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
