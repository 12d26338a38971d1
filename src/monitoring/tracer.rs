/*!
 * Hook Tracing
 * Structured tracing for hook invocations using the tracing crate
 */

use crate::hooks::HookState;
use crate::security::HookPhase;
use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level, Span};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Hooks running longer than this are reported as slow
const SLOW_HOOK: Duration = Duration::from_secs(1);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - HOOKS_TRACE_JSON: Enable JSON output (default: false)
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("HOOKS_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
        debug!("tracing initialized with JSON output");
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .compact(),
            )
            .init();
        debug!("tracing initialized");
    }
}

/// Unique id correlating every event of one hook invocation
pub fn generate_invocation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one hook invocation from launch to join
pub struct HookSpan {
    span: Span,
    start: Instant,
    hook: String,
    invocation_id: String,
    state: HookState,
}

impl HookSpan {
    pub fn new(phase: HookPhase, hook: &str) -> Self {
        let invocation_id = generate_invocation_id();

        let span = span!(
            Level::INFO,
            "hook",
            invocation_id = %invocation_id,
            %phase,
            hook,
            state = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            hook: hook.to_string(),
            invocation_id,
            state: HookState::Idle,
        }
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn state(&self) -> HookState {
        self.state
    }

    /// Record a lifecycle transition; final states are sticky
    pub fn transition(&mut self, state: HookState) {
        if self.state.is_final() {
            return;
        }
        self.state = state;
        self.span.record("state", tracing::field::display(state));
        let _entered = self.span.enter();
        debug!(%state, "hook state changed");
    }

    /// Span to attach to the worker thread
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for HookSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.span.record("duration_ms", duration.as_millis() as u64);
        let _entered = self.span.enter();

        if duration > SLOW_HOOK {
            warn!(
                hook = %self.hook,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow hook"
            );
        } else {
            info!(
                hook = %self.hook,
                state = %self.state,
                duration_ms = duration.as_millis() as u64,
                "hook finished"
            );
        }
    }
}
