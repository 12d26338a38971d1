/*!
 * Site Hooks Library
 * Sandboxed pre- and post-build hook execution for a static site compiler
 */

pub mod config;
pub mod hooks;
pub mod monitoring;
pub mod pipeline;
pub mod sandbox;
pub mod security;

// Re-exports
pub use config::{load_config, resolve_config_path, ConfigError, LoadedConfig, ProjectConfig};
pub use hooks::{
    discover, run_hooks, ExecutionOutcome, HookDescriptor, HookError, HookFailure, HookSet,
    HookSupervisor, PhaseContext,
};
pub use monitoring::init_tracing;
pub use pipeline::{BuildError, BuildLayout, HookPipeline, PhaseReport};
pub use sandbox::{CapabilityRegistry, NetworkAccess, SandboxRuntime};
pub use security::{
    HookPhase, HttpRequest, HttpResponse, HttpTransport, Namespace, NamespaceError,
    NamespaceResolver, NamespaceRoots, NetworkError, NetworkPolicy, NetworkPolicyGate,
};
