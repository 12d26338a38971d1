/*!
 * Hook Supervisor
 * Runs each hook of a phase on its own worker and resolves how it ended
 *
 * Every hook gets a fresh runtime and a dedicated thread. The supervisor
 * blocks on whichever of the exit signal or the worker's completion is
 * published first, then always joins the worker so the Lua state is gone
 * before the next hook starts.
 */

use super::types::*;
use crate::monitoring::HookSpan;
use crate::sandbox::{
    CapabilityContext, CapabilityRegistry, ExitSignal, NetworkAccess, SandboxRuntime,
};
use crate::security::{HookPhase, NamespaceResolver};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

/// Everything the hooks of one phase run against
#[derive(Debug, Clone)]
pub struct PhaseContext {
    pub phase: HookPhase,
    pub resolver: Arc<NamespaceResolver>,
    /// `None` when networking is disabled for the build
    pub network: Option<NetworkAccess>,
}

impl PhaseContext {
    pub fn new(phase: HookPhase, resolver: Arc<NamespaceResolver>) -> Self {
        Self {
            phase,
            resolver,
            network: None,
        }
    }

    pub fn with_network(mut self, network: NetworkAccess) -> Self {
        self.network = Some(network);
        self
    }
}

/// Which channel resolved first
enum Race {
    Exit(i32),
    Done(ExecutionOutcome),
    /// A sender was dropped without publishing
    Lost,
}

/// Sequential, fail-fast hook executor
#[derive(Debug, Clone, Default)]
pub struct HookSupervisor {
    registry: CapabilityRegistry,
}

impl HookSupervisor {
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self { registry }
    }

    /// Run `hooks` in order, stopping at the first failure
    pub fn run_phase(&self, hooks: &[HookDescriptor], context: &PhaseContext) -> HookResult<()> {
        info!(phase = %context.phase, hooks = hooks.len(), "running hook phase");

        for hook in hooks {
            let outcome = self.run_hook(hook, context)?;
            if let Some(err) = HookError::from_outcome(context.phase, hook.name(), outcome) {
                error!(phase = %context.phase, hook = hook.name(), "{}", err.reason);
                return Err(err);
            }
        }

        Ok(())
    }

    /// Execute one hook to completion and report its outcome.
    ///
    /// Only setup problems and worker panics are errors here; how the script
    /// itself ended is carried by the outcome.
    pub fn run_hook(
        &self,
        hook: &HookDescriptor,
        context: &PhaseContext,
    ) -> HookResult<ExecutionOutcome> {
        let phase = context.phase;
        let mut span = HookSpan::new(phase, hook.name());

        let (signal, exit_rx) = ExitSignal::channel();
        let capabilities = CapabilityContext {
            hook: hook.name().to_string(),
            phase,
            resolver: Arc::clone(&context.resolver),
            network: context.network.clone(),
            exit: Arc::clone(&signal),
        };

        let runtime = SandboxRuntime::new(capabilities, &self.registry)
            .map_err(|e| HookError::new(phase, hook.name(), HookFailure::Setup(e.to_string())))?;

        let (done_tx, done_rx) = flume::bounded::<ExecutionOutcome>(1);
        let script = hook.path().to_path_buf();
        let worker_span = span.span().clone();

        span.transition(HookState::Running);
        let worker = thread::Builder::new()
            .name(format!("hook-{}", hook.name()))
            .spawn(move || {
                let _entered = worker_span.enter();
                let outcome = runtime.run(&script);
                // receiver gone means the exit signal already won
                let _ = done_tx.send(outcome);
            })
            .map_err(|e| HookError::new(phase, hook.name(), HookFailure::Setup(e.to_string())))?;

        let race = flume::Selector::new()
            .recv(&exit_rx, |code| code.map_or(Race::Lost, Race::Exit))
            .recv(&done_rx, |outcome| outcome.map_or(Race::Lost, Race::Done))
            .wait();

        let joined = worker.join();

        let outcome = match race {
            Race::Exit(code) => Some(ExecutionOutcome::Terminated(code)),
            // the exit is published before the worker can return
            Race::Done(outcome) => Some(match signal.code() {
                Some(code) => ExecutionOutcome::Terminated(code),
                None => outcome,
            }),
            Race::Lost => signal.code().map(ExecutionOutcome::Terminated),
        };

        let outcome = match (joined, outcome) {
            (Ok(()), Some(outcome)) => outcome,
            _ => {
                span.transition(HookState::Terminated);
                return Err(HookError::new(phase, hook.name(), HookFailure::WorkerPanicked));
            }
        };

        span.transition(match outcome {
            ExecutionOutcome::Terminated(_) => HookState::Terminated,
            ExecutionOutcome::Completed(_) => HookState::Completed,
        });
        debug!(
            hook = hook.name(),
            ?outcome,
            elapsed_ms = span.elapsed().as_millis() as u64,
            "hook resolved"
        );

        Ok(outcome)
    }
}

/// Run one phase with the standard capability set
pub fn run_hooks(hooks: &[HookDescriptor], context: &PhaseContext) -> HookResult<()> {
    HookSupervisor::default().run_phase(hooks, context)
}
