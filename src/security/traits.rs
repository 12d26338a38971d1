/*!
 * Security Traits
 * Seams between the sandbox and the host
 */

use super::types::{HttpRequest, HttpResponse, NetworkResult};

/// Executes requests that already passed the policy gate.
///
/// Implementations must enforce the policy's timeout, response size cap and
/// redirect bounds while the request is in flight.
pub trait HttpTransport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> NetworkResult<HttpResponse>;
}
