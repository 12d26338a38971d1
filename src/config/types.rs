/*!
 * Configuration Types
 * Project configuration as read from `site.json`
 */

use crate::security::NetworkPolicy;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration result
#[must_use = "configuration can fail to load and must be handled"]
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Project configuration; missing keys take the defaults below
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfig {
    pub hooks: HooksConfig,
    /// Source directory, relative to the config file
    pub input: PathBuf,
    /// Output directory, relative to the config file
    pub output: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            hooks: HooksConfig::default(),
            input: PathBuf::from("./src"),
            output: PathBuf::from("./build"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HooksConfig {
    pub enabled: bool,
    /// Directory holding `pre/` and `post/`, relative to the config file
    pub path: PathBuf,
    pub http: HttpOptions,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("hooks"),
            http: HttpOptions::default(),
        }
    }
}

/// Methods a project may allow hooks to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network options for hooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpOptions {
    /// Install the `http` capability at all
    pub enabled: bool,
    /// Permit plain `http` in addition to `https`
    pub http_allowed: bool,
    pub allowed_hosts: Vec<String>,
    pub allowed_methods: Vec<HttpMethod>,
    pub max_response_bytes: u64,
    /// Milliseconds
    pub timeout: u64,
    pub follow_redirects: bool,
    pub max_redirects: usize,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            http_allowed: false,
            allowed_hosts: Vec::new(),
            allowed_methods: Vec::new(),
            max_response_bytes: NetworkPolicy::DEFAULT_MAX_RESPONSE_BYTES,
            timeout: NetworkPolicy::DEFAULT_TIMEOUT.as_millis() as u64,
            follow_redirects: true,
            max_redirects: NetworkPolicy::DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl HttpOptions {
    /// Policy enforced by the network gate and transport
    pub fn to_policy(&self) -> NetworkPolicy {
        let policy = self
            .allowed_hosts
            .iter()
            .fold(NetworkPolicy::default(), |policy, host| policy.allow_host(host));

        self.allowed_methods
            .iter()
            .fold(policy, |policy, method| policy.allow_method(method.as_str()))
            .with_http(self.http_allowed)
            .with_max_response_bytes(self.max_response_bytes)
            .with_timeout(Duration::from_millis(self.timeout))
            .with_redirects(self.follow_redirects, self.max_redirects)
    }
}

/// Configuration errors
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("could not read config {path:?}: {source}")]
    #[diagnostic(code(config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config {path:?}: {source}")]
    #[diagnostic(code(config::parse), help("The config file must be a JSON object."))]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    #[diagnostic(code(config::invalid))]
    Invalid(String),
}
