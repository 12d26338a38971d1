/*!
 * Security Module
 * Namespaced path resolution and outbound network policy for hook scripts
 */

pub mod namespace;
pub mod network;
pub mod path;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use namespace::{parse_address, NamespaceBinding, NamespaceResolver, NamespaceRoots};
pub use network::NetworkPolicyGate;
pub use traits::*;
pub use types::*;
