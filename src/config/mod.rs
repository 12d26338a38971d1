/*!
 * Configuration Module
 * Loading and validating the project configuration
 */

pub mod types;

pub use types::*;

use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "SITE_CONFIG";

/// Locations tried, in order, when no override is set
pub const CONFIG_CANDIDATES: [&str; 2] = ["site.json", "src/site.json"];

/// Locate the project config relative to `cwd`
pub fn resolve_config_path(cwd: &Path) -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        debug!(%path, "config path taken from {}", CONFIG_ENV);
        return cwd.join(path);
    }

    CONFIG_CANDIDATES
        .iter()
        .map(|candidate| cwd.join(candidate))
        .find(|path| path.is_file())
        .unwrap_or_else(|| cwd.join(CONFIG_CANDIDATES[0]))
}

/// A loaded config plus the directory its relative paths are based on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    pub config: ProjectConfig,
    pub base_dir: PathBuf,
}

impl LoadedConfig {
    pub fn input_dir(&self) -> PathBuf {
        self.base_dir.join(&self.config.input)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.base_dir.join(&self.config.output)
    }

    pub fn hooks_dir(&self) -> PathBuf {
        self.base_dir.join(&self.config.hooks.path)
    }
}

/// Read, parse and validate the config at `path`
pub fn load_config(path: &Path) -> ConfigResult<LoadedConfig> {
    let raw = std::fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: ProjectConfig =
        serde_json::from_slice(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    validate(&config)?;

    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    info!(
        path = %path.display(),
        hooks = config.hooks.enabled,
        network = config.hooks.http.enabled,
        "project config loaded"
    );

    Ok(LoadedConfig { config, base_dir })
}

fn validate(config: &ProjectConfig) -> ConfigResult<()> {
    if config.hooks.path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("hooks.path must not be empty".into()));
    }
    if config.input == config.output {
        return Err(ConfigError::Invalid(
            "input and output must be different directories".into(),
        ));
    }

    let http = &config.hooks.http;
    if http.enabled && http.timeout == 0 {
        return Err(ConfigError::Invalid("hooks.http.timeout must be positive".into()));
    }
    for host in &http.allowed_hosts {
        if host.is_empty() || host.contains('/') || (host.contains(':') && !host.starts_with('[')) {
            return Err(ConfigError::Invalid(format!(
                "hooks.http.allowedHosts entry `{}` must be a bare host name",
                host
            )));
        }
    }
    Ok(())
}
