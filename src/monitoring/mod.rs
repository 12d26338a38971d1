/*!
 * Monitoring
 * Tracing initialisation and per-hook spans
 */

mod tracer;

pub use tracer::{generate_invocation_id, init_tracing, HookSpan};
