/*!
 * Site Hooks - Main Entry Point
 *
 * Runs the hook phases of a project build:
 * - `pre`  before compilation
 * - `post` after the static copy
 * - `all`  both, in order (default)
 */

use miette::{bail, IntoDiagnostic, Result};
use tracing::info;

use site_hooks::{init_tracing, load_config, resolve_config_path, HookPipeline, PhaseReport};

fn main() -> Result<()> {
    init_tracing();

    let which = std::env::args().nth(1).unwrap_or_else(|| "all".to_string());
    let (pre, post) = match which.as_str() {
        "pre" => (true, false),
        "post" => (false, true),
        "all" => (true, true),
        other => bail!("unknown phase `{}`, expected pre, post or all", other),
    };

    let cwd = std::env::current_dir().into_diagnostic()?;
    let config_path = resolve_config_path(&cwd);
    let loaded = load_config(&config_path)?;

    let pipeline = HookPipeline::from_config(&loaded)?;
    if !pipeline.is_enabled() {
        info!("nothing to do, hooks are disabled for this project");
        return Ok(());
    }

    if pre {
        report(pipeline.run_pre()?);
    }
    if post {
        report(pipeline.run_post()?);
    }

    Ok(())
}

fn report(report: PhaseReport) {
    info!(
        "Run time of {} {} hooks: {:?}",
        report.hooks_run, report.phase, report.elapsed
    );
}
