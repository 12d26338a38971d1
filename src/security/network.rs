/*!
 * Network Policy Gate
 * Scheme, host and method allow-listing applied before any connection is attempted
 */

use super::types::*;
use std::sync::Arc;
use tracing::warn;
use url::Url;

/// Declarative check for outbound requests issued by hooks
#[derive(Debug, Clone)]
pub struct NetworkPolicyGate {
    policy: Arc<NetworkPolicy>,
}

impl NetworkPolicyGate {
    pub fn new(policy: NetworkPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &NetworkPolicy {
        &self.policy
    }

    /// Validate a candidate request and return its parsed URL
    pub fn check(&self, method: &str, url: &str) -> NetworkResult<Url> {
        let parsed = Url::parse(url).map_err(|_| NetworkError::InvalidUrl(url.to_string()))?;
        self.check_destination(&parsed)?;

        let method = method.to_ascii_uppercase();
        if !self.policy.allowed_methods.contains(&method) {
            warn!(method = %method, url = %parsed, "hook request denied: method not allowed");
            return Err(NetworkError::PolicyDenied(format!(
                "method {} is not allowed",
                method
            )));
        }

        Ok(parsed)
    }

    /// Scheme and host rules only; also applied to every redirect hop
    pub fn check_destination(&self, url: &Url) -> NetworkResult<()> {
        match url.scheme() {
            "https" => {}
            "http" if self.policy.http_allowed => {}
            "http" => {
                warn!(url = %url, "hook request denied: plain http disabled");
                return Err(NetworkError::PolicyDenied(
                    "plain http is not allowed, use https".to_string(),
                ));
            }
            other => {
                warn!(url = %url, "hook request denied: unsupported scheme");
                return Err(NetworkError::PolicyDenied(format!(
                    "scheme {} is not allowed",
                    other
                )));
            }
        }

        let host = normalized_host(url).ok_or_else(|| NetworkError::InvalidUrl(url.to_string()))?;
        if !self.policy.allowed_hosts.contains(&host) {
            warn!(host = %host, "hook request denied: host not allowed");
            return Err(NetworkError::PolicyDenied(format!(
                "host {} is not allowed",
                host
            )));
        }

        Ok(())
    }
}

/// Lower-cased host with IPv6 brackets stripped
fn normalized_host(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let host = host
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(host);
    Some(host.to_ascii_lowercase())
}
