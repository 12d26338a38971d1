/*!
 * Sandbox Module
 * Isolated Lua execution with capability-scoped host access
 */

pub mod capabilities;
pub mod exit;
pub mod registry;
pub mod runtime;
pub mod transport;

// Re-export for convenience
pub use capabilities::fs::{DirEntry, FsError, ScopedFs};
pub use exit::{ExitRequested, ExitSignal};
pub use registry::{CapabilityContext, CapabilityFactory, CapabilityRegistry};
pub use runtime::{SandboxError, SandboxResult, SandboxRuntime};
pub use transport::{NetworkAccess, ReqwestTransport};
