/*!
 * Hook Network Transport
 * Gate-then-execute access to HTTP(S) with the policy's bounds enforced in flight
 */

use crate::security::{
    HttpRequest, HttpResponse, HttpTransport, NetworkError, NetworkPolicy, NetworkPolicyGate,
    NetworkResult,
};
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info};

/// Gate plus transport handed to the `http` capability
#[derive(Clone)]
pub struct NetworkAccess {
    gate: NetworkPolicyGate,
    transport: Arc<dyn HttpTransport>,
}

impl NetworkAccess {
    pub fn new(gate: NetworkPolicyGate, transport: Arc<dyn HttpTransport>) -> Self {
        Self { gate, transport }
    }

    /// Production access backed by a blocking reqwest client
    pub fn with_reqwest(policy: NetworkPolicy) -> NetworkResult<Self> {
        let gate = NetworkPolicyGate::new(policy);
        let transport = ReqwestTransport::new(&gate)?;
        Ok(Self::new(gate, Arc::new(transport)))
    }

    pub fn gate(&self) -> &NetworkPolicyGate {
        &self.gate
    }

    /// Check the request against the gate, then execute it.
    ///
    /// The transport is never touched for a denied request.
    pub fn fetch(
        &self,
        method: &str,
        url: &str,
        headers: Vec<(String, String)>,
        body: Option<Vec<u8>>,
    ) -> NetworkResult<HttpResponse> {
        let url = self.gate.check(method, url)?;

        let mut request = headers
            .into_iter()
            .fold(HttpRequest::new(method.to_ascii_uppercase(), url), |request, (name, value)| {
                request.with_header(name, value)
            });
        if let Some(body) = body {
            request = request.with_body(body);
        }

        debug!(method = %request.method, url = %request.url, "hook request allowed");
        self.transport.execute(request)
    }
}

impl fmt::Debug for NetworkAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkAccess")
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

/// Blocking HTTP transport enforcing timeout, size cap and redirect bounds
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
    max_response_bytes: u64,
}

impl ReqwestTransport {
    pub fn new(gate: &NetworkPolicyGate) -> NetworkResult<Self> {
        let policy = gate.policy();

        let redirect = if policy.follow_redirects {
            let max = policy.max_redirects;
            let hop_gate = gate.clone();
            reqwest::redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() > max {
                    return attempt.error(format!("too many redirects (max {})", max));
                }
                match hop_gate.check_destination(attempt.url()) {
                    Ok(()) => attempt.follow(),
                    Err(e) => attempt.error(e),
                }
            })
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(policy.timeout)
            .redirect(redirect)
            .user_agent(concat!("site-hooks/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NetworkError::Transport(format!("could not create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_response_bytes: policy.max_response_bytes,
        })
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute(&self, request: HttpRequest) -> NetworkResult<HttpResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| NetworkError::PolicyDenied(format!("method {} is invalid", request.method)))?;

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        let limit = self.max_response_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(NetworkError::ResponseTooLarge { limit });
        }

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        // read one byte past the cap so an oversized body is detected without buffering it
        let mut body = Vec::new();
        response
            .take(limit.saturating_add(1))
            .read_to_end(&mut body)
            .map_err(|e| NetworkError::Transport(format!("failed to read response body: {}", e)))?;
        if body.len() as u64 > limit {
            return Err(NetworkError::ResponseTooLarge { limit });
        }

        info!(
            url = %request.url,
            status,
            bytes = body.len(),
            "hook request completed"
        );

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
