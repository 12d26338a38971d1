/*!
 * Hooks Module
 * Discovery and supervised execution of build hooks
 */

pub mod discovery;
pub mod supervisor;
pub mod types;

// Re-export for convenience
pub use discovery::{discover, HOOK_EXTENSION};
pub use supervisor::{run_hooks, HookSupervisor, PhaseContext};
pub use types::*;
