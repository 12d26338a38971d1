/*!
 * Security Types
 * Phases, namespaces, access modes and network policy shared by the hook sandbox
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Namespace resolution result
///
/// # Must Use
/// Resolution failures are capability errors and must reach the script
#[must_use = "namespace resolution can fail and must be handled"]
pub type NamespaceResult<T> = Result<T, NamespaceError>;

/// Network operation result
///
/// # Must Use
/// Denied requests must never be silently retried
#[must_use = "network operations can fail and must be handled"]
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Build phase a hook runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    /// Before document compilation
    Pre,
    /// After static files were copied into the output
    Post,
}

impl HookPhase {
    pub const ALL: [HookPhase; 2] = [HookPhase::Pre, HookPhase::Post];

    /// Directory name scanned for this phase under the hooks root
    #[inline]
    pub const fn dir_name(self) -> &'static str {
        match self {
            HookPhase::Pre => "pre",
            HookPhase::Post => "post",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Logical filesystem roots reachable from hook scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Cache,
    Project,
    Temp,
    Generated,
    Built,
}

impl Namespace {
    pub const ALL: [Namespace; 5] = [
        Namespace::Cache,
        Namespace::Project,
        Namespace::Temp,
        Namespace::Generated,
        Namespace::Built,
    ];

    /// Address prefix used by scripts, without the trailing colon
    #[inline]
    pub const fn prefix(self) -> &'static str {
        match self {
            Namespace::Cache => "cache",
            Namespace::Project => "project",
            Namespace::Temp => "temp",
            Namespace::Generated => "generated",
            Namespace::Built => "built",
        }
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for Namespace {
    type Err = NamespaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Namespace::ALL
            .into_iter()
            .find(|ns| ns.prefix() == s)
            .ok_or_else(|| NamespaceError::InvalidPrefix(s.to_string()))
    }
}

/// Access mode a namespace is bound with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    /// Check whether this binding mode permits the requested access
    #[inline]
    #[must_use]
    pub const fn permits(self, access: Access) -> bool {
        matches!(
            (self, access),
            (AccessMode::ReadWrite, _) | (AccessMode::ReadOnly, Access::Read)
        )
    }
}

/// Access requested by a single filesystem operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Read,
    Write,
}

/// Namespace resolution errors, surfaced to scripts as capability errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum NamespaceError {
    #[error("invalid path `{0}`: must start with `cache:`, `project:`, `temp:`, `generated:` or `built:` followed by a relative path")]
    #[diagnostic(
        code(namespace::invalid_prefix),
        help("Hook paths look like `temp:out/data.json`.")
    )]
    InvalidPrefix(String),

    #[error("path traversal is not allowed: `{0}`")]
    #[diagnostic(
        code(namespace::traversal_denied),
        help("Paths must stay inside their namespace; `..`, absolute paths and escaping symlinks are rejected.")
    )]
    TraversalDenied(String),

    #[error("{namespace} files are read-only")]
    #[diagnostic(code(namespace::access_denied))]
    AccessDenied { namespace: Namespace },

    #[error("{namespace} files are only available in {allowed} hooks, not {phase} hooks")]
    #[diagnostic(code(namespace::phase_restricted))]
    PhaseRestricted {
        namespace: Namespace,
        phase: HookPhase,
        allowed: HookPhase,
    },
}

/// Outbound request policy for the `http` capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPolicy {
    /// Plain `http` in addition to `https`
    pub http_allowed: bool,
    /// Lower-cased host names, exact match
    pub allowed_hosts: BTreeSet<String>,
    /// Upper-cased method names
    pub allowed_methods: BTreeSet<String>,
    pub max_response_bytes: u64,
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub max_redirects: usize,
}

impl NetworkPolicy {
    pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 2 * 1024 * 1024;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);
    pub const DEFAULT_MAX_REDIRECTS: usize = 5;

    /// IPv6 literals may be given with or without brackets
    pub fn allow_host(mut self, host: impl AsRef<str>) -> Self {
        let host = host.as_ref();
        let host = host
            .strip_prefix('[')
            .and_then(|v| v.strip_suffix(']'))
            .unwrap_or(host);
        self.allowed_hosts.insert(host.to_ascii_lowercase());
        self
    }

    pub fn allow_method(mut self, method: impl AsRef<str>) -> Self {
        self.allowed_methods
            .insert(method.as_ref().to_ascii_uppercase());
        self
    }

    pub fn with_http(mut self, allowed: bool) -> Self {
        self.http_allowed = allowed;
        self
    }

    pub fn with_max_response_bytes(mut self, bytes: u64) -> Self {
        self.max_response_bytes = bytes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_redirects(mut self, follow: bool, max: usize) -> Self {
        self.follow_redirects = follow;
        self.max_redirects = max;
        self
    }
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self {
            http_allowed: false,
            allowed_hosts: BTreeSet::new(),
            allowed_methods: BTreeSet::new(),
            max_response_bytes: Self::DEFAULT_MAX_RESPONSE_BYTES,
            timeout: Self::DEFAULT_TIMEOUT,
            follow_redirects: true,
            max_redirects: Self::DEFAULT_MAX_REDIRECTS,
        }
    }
}

/// Network errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum NetworkError {
    #[error("policy denied: {0}")]
    #[diagnostic(
        code(network::policy_denied),
        help("Add the host and method to hooks.http in the project config.")
    )]
    PolicyDenied(String),

    #[error("invalid url `{0}`")]
    #[diagnostic(code(network::invalid_url))]
    InvalidUrl(String),

    #[error("response exceeded {limit} bytes")]
    #[diagnostic(code(network::response_too_large))]
    ResponseTooLarge { limit: u64 },

    #[error("request failed: {0}")]
    #[diagnostic(code(network::transport))]
    Transport(String),

    #[error("network access is disabled")]
    #[diagnostic(code(network::disabled), help("Set hooks.http.enabled in the project config."))]
    Disabled,
}

/// Request that already passed the policy gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into(),
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

/// Response handed back to the script
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}
