/*!
 * Hook Pipeline
 * Wires configuration, discovery and both hook phases into a build
 *
 * Layout under the config directory:
 * - `.site/cache`      kept between builds
 * - `.site/temp`       wiped when the pre-build phase starts
 * - `.site/generated`  wiped when the pre-build phase starts, copied to
 *                      `<output>/_site` before post-build hooks run
 *
 * A post-build run on its own keeps whatever an earlier pre-build run left.
 */

use crate::config::{ConfigError, LoadedConfig};
use crate::hooks::{discover, DiscoveryError, HookError, HookSet, HookSupervisor, PhaseContext};
use crate::sandbox::NetworkAccess;
use crate::security::{HookPhase, Namespace, NamespaceResolver, NamespaceRoots, NetworkError};
use miette::Diagnostic;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// Work directory created next to the config file
pub const WORK_DIR: &str = ".site";

/// Directory inside the build output that receives generated files
pub const SITE_META_DIR: &str = "_site";

/// Build result
#[must_use = "build steps can fail and must be handled"]
pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Error, Debug, Diagnostic)]
pub enum BuildError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Network(#[from] NetworkError),

    #[error("{context}: {source}")]
    #[diagnostic(code(build::io))]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| BuildError::Io { context, source }
    }
}

/// On-disk directories backing the five namespaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    pub cache: PathBuf,
    pub temp: PathBuf,
    pub generated: PathBuf,
    pub project: PathBuf,
    pub built: PathBuf,
}

impl BuildLayout {
    pub fn new(base_dir: &Path, input: &Path, output: &Path) -> Self {
        let work = base_dir.join(WORK_DIR);
        Self {
            cache: work.join("cache"),
            temp: work.join("temp"),
            generated: work.join("generated"),
            project: input.to_path_buf(),
            built: output.to_path_buf(),
        }
    }

    pub fn from_config(loaded: &LoadedConfig) -> Self {
        Self::new(&loaded.base_dir, &loaded.input_dir(), &loaded.output_dir())
    }

    /// Where generated files live during the post-build phase
    pub fn site_meta_dir(&self) -> PathBuf {
        self.built.join(SITE_META_DIR)
    }

    pub fn roots(&self) -> NamespaceRoots {
        NamespaceRoots {
            cache: self.cache.clone(),
            project: self.project.clone(),
            temp: self.temp.clone(),
            generated: self.generated.clone(),
            built: self.built.clone(),
        }
    }

    /// Wipe `temp` and `generated`, then make sure every work directory exists
    pub fn prepare(&self) -> BuildResult<()> {
        for dir in [&self.temp, &self.generated] {
            match std::fs::remove_dir_all(dir) {
                Ok(()) => debug!(dir = %dir.display(), "work directory cleared"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(BuildError::io(format!("could not clear {}", dir.display()))(e)),
            }
        }
        self.ensure()
    }

    /// Create missing work directories without touching their contents
    pub fn ensure(&self) -> BuildResult<()> {
        for dir in [&self.cache, &self.temp, &self.generated] {
            std::fs::create_dir_all(dir)
                .map_err(BuildError::io(format!("could not create {}", dir.display())))?;
        }
        Ok(())
    }
}

/// Timing of one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: HookPhase,
    pub hooks_run: usize,
    pub elapsed: Duration,
}

/// Hook phases of a single build
#[derive(Debug)]
pub struct HookPipeline {
    layout: BuildLayout,
    /// `None` when hooks are disabled
    hooks: Option<HookSet>,
    resolver: Arc<NamespaceResolver>,
    network: Option<NetworkAccess>,
    supervisor: HookSupervisor,
}

impl HookPipeline {
    /// Pipeline for a configured project; discovers hooks when enabled.
    ///
    /// Nothing on disk changes until a phase runs.
    pub fn from_config(loaded: &LoadedConfig) -> BuildResult<Self> {
        let layout = BuildLayout::from_config(loaded);
        let hooks_config = &loaded.config.hooks;

        if !hooks_config.enabled {
            info!("hooks disabled");
            return Ok(Self::new(layout, None, None));
        }

        let hooks = discover(&loaded.hooks_dir())?;
        let network = if hooks_config.http.enabled {
            Some(NetworkAccess::with_reqwest(hooks_config.http.to_policy())?)
        } else {
            None
        };

        Ok(Self::new(layout, Some(hooks), network))
    }

    pub fn new(layout: BuildLayout, hooks: Option<HookSet>, network: Option<NetworkAccess>) -> Self {
        let resolver = Arc::new(NamespaceResolver::new(layout.roots()));
        Self {
            layout,
            hooks,
            resolver,
            network,
            supervisor: HookSupervisor::default(),
        }
    }

    pub fn with_supervisor(mut self, supervisor: HookSupervisor) -> Self {
        self.supervisor = supervisor;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.hooks.is_some()
    }

    pub fn layout(&self) -> &BuildLayout {
        &self.layout
    }

    /// Start a build: clear `temp` and `generated`, then run pre-build hooks;
    /// call before compilation
    pub fn run_pre(&self) -> BuildResult<PhaseReport> {
        if self.is_enabled() {
            self.layout.prepare()?;
        }
        self.run_phase(HookPhase::Pre, Arc::clone(&self.resolver))
    }

    /// Publish generated files into the output, then run post-build hooks;
    /// call after the static copy
    pub fn run_post(&self) -> BuildResult<PhaseReport> {
        if !self.is_enabled() {
            return self.run_phase(HookPhase::Post, Arc::clone(&self.resolver));
        }

        self.layout.ensure()?;
        let site_meta = self.layout.site_meta_dir();
        if !is_dir_empty(&self.layout.generated)? {
            copy_dir(&self.layout.generated, &site_meta)?;
            debug!(to = %site_meta.display(), "generated files published");
        }

        let resolver = Arc::new(self.resolver.with_root(Namespace::Generated, site_meta));
        self.run_phase(HookPhase::Post, resolver)
    }

    fn run_phase(&self, phase: HookPhase, resolver: Arc<NamespaceResolver>) -> BuildResult<PhaseReport> {
        let start = Instant::now();
        let Some(hooks) = &self.hooks else {
            return Ok(PhaseReport {
                phase,
                hooks_run: 0,
                elapsed: start.elapsed(),
            });
        };

        let hooks = hooks.phase(phase);
        let mut context = PhaseContext::new(phase, resolver);
        context.network = self.network.clone();

        self.supervisor.run_phase(hooks, &context)?;

        let report = PhaseReport {
            phase,
            hooks_run: hooks.len(),
            elapsed: start.elapsed(),
        };
        info!(
            %phase,
            hooks = report.hooks_run,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "hook phase finished"
        );
        Ok(report)
    }
}

/// Missing directories count as empty
fn is_dir_empty(dir: &Path) -> BuildResult<bool> {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(BuildError::io(format!("could not read {}", dir.display()))(e)),
    }
}

fn copy_dir(from: &Path, to: &Path) -> BuildResult<()> {
    std::fs::create_dir_all(to).map_err(BuildError::io(format!("could not create {}", to.display())))?;

    let entries = std::fs::read_dir(from).map_err(BuildError::io(format!("could not read {}", from.display())))?;
    for entry in entries {
        let entry = entry.map_err(BuildError::io(format!("could not read {}", from.display())))?;
        let target = to.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(BuildError::io(format!("could not stat {}", entry.path().display())))?;

        if file_type.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)
                .map_err(BuildError::io(format!("could not copy to {}", target.display())))?;
        }
    }
    Ok(())
}
