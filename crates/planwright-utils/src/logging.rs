//! Structured logging for plan orchestration
//!
//! Operational diagnostics go through `tracing`. The persisted, per-plan
//! `work.log` is a separate audit trail written by the artifact store.

use std::io::IsTerminal;
use tracing::{Level, error, info, span, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::types::{BlockedReport, PhaseId};

/// Colors only when stdout is a terminal and `NO_COLOR` is unset.
fn use_color() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("planwright=debug,info")
            } else {
                EnvFilter::try_new("planwright=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber.
///
/// Compact, human-readable output by default. `verbose` adds targets and
/// span close events carrying `plan_id` and `phase`. `RUST_LOG` wins over both.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = default_filter(verbose);

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(use_color())
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(use_color())
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Initialize a JSON subscriber for machine consumers.
pub fn init_tracing_json() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(default_filter(false))
        .with(fmt::layer().json().with_current_span(true))
        .try_init()?;
    Ok(())
}

/// Span covering one orchestrator operation on a plan.
pub fn plan_span(plan_id: &str, phase: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "plan_operation",
        plan_id = %plan_id,
        phase = %phase,
    )
}

/// Log a committed phase transition.
pub fn log_transition(plan_id: &str, from: &str, to: &str) {
    info!(plan_id = %plan_id, from = %from, to = %to, "Phase transition");
}

/// Log a batch of tasks handed to skills.
pub fn log_batch(plan_id: &str, phase: PhaseId, batch: usize, task_ids: &[u32]) {
    info!(
        plan_id = %plan_id,
        phase = %phase,
        batch = batch,
        tasks = ?task_ids,
        "Dispatching task batch"
    );
}

/// Log a failed phase operation.
pub fn log_phase_error(plan_id: &str, phase: &str, error: &str) {
    error!(plan_id = %plan_id, phase = %phase, error = %error, "Phase operation failed");
}

/// Log a plan stopping at its iteration cap.
pub fn log_blocked(plan_id: &str, report: &BlockedReport) {
    warn!(
        plan_id = %plan_id,
        phase = %report.phase,
        iteration_count = report.iteration_count,
        failing = ?report.failing,
        "Plan blocked at iteration cap"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers_do_not_require_a_subscriber() {
        let span = plan_span("demo", "4-plan");
        let _entered = span.enter();
        log_transition("demo", "3-outline", "4-plan");
        log_batch("demo", PhaseId::Execute, 1, &[1, 2]);
        log_phase_error("demo", "5-execute", "boom");
        log_blocked(
            "demo",
            &BlockedReport {
                phase: PhaseId::Execute,
                iteration_count: 5,
                failing: vec!["task 1".to_string()],
            },
        );
    }

    #[test]
    fn test_init_twice_reports_error() {
        let first = init_tracing(false);
        let second = init_tracing(true);
        // Only one global subscriber may be installed per process.
        assert!(first.is_err() || second.is_err());
    }
}
