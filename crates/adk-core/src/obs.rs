//! Structured observability hooks for kernel run lifecycle events.
//!
//! This module provides:
//! - Run-scoped tracing spans via `RunSpan` RAII guard
//! - Emission functions for lifecycle events: start, stage, solver, trial,
//!   SLO breach, finish and failure
//!
//! Events are emitted at `info!` level (breaches and failures at `warn!`).
//! Filtering follows `RUST_LOG`; see [`crate::telemetry::init_tracing`].

use tracing::{info, warn};

use crate::adversarial::{PerturbationTrial, TrialOutcome};
use crate::domain::config::SolverKind;
use crate::domain::result::SolverStatus;
use crate::evidence::SloCompliance;

/// RAII guard that enters a run-scoped tracing span for the duration of a run.
///
/// # Example
///
/// ```ignore
/// let _span = RunSpan::enter("ops.thermal/2025-01-15", 3);
/// // every event below carries problem_id and invocation
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the run key.
    pub fn enter(problem_id: &str, invocation: u64) -> Self {
        Self {
            _span: run_span(problem_id, invocation).entered(),
        }
    }
}

/// The `adk.run` span, for instrumenting futures that cross `.await` points.
pub fn run_span(problem_id: &str, invocation: u64) -> tracing::Span {
    tracing::info_span!("adk.run", problem_id = %problem_id, invocation = invocation)
}

/// Emit event: run started.
pub fn emit_run_started(problem_id: &str, invocation: u64, solver: SolverKind) {
    info!(
        event = "run.started",
        problem_id = %problem_id,
        invocation = invocation,
        solver = %solver,
    );
}

/// Emit event: the kernel entered a stage.
pub fn emit_stage_entered(problem_id: &str, stage: &str) {
    info!(event = "stage.entered", problem_id = %problem_id, stage = %stage);
}

/// Emit event: a solver returned.
pub fn emit_solver_finished(
    problem_id: &str,
    solver: SolverKind,
    status: SolverStatus,
    duration_ms: u64,
    iterations: u64,
) {
    info!(
        event = "solver.finished",
        problem_id = %problem_id,
        solver = %solver,
        status = %status,
        duration_ms = duration_ms,
        iterations = iterations,
    );
}

/// Emit event: one perturbation trial finished.
pub fn emit_trial_finished(problem_id: &str, trial: &PerturbationTrial) {
    match &trial.outcome {
        TrialOutcome::Completed { result, delta } => info!(
            event = "trial.finished",
            problem_id = %problem_id,
            trial = %trial.name,
            kind = trial.kind.name(),
            status = %result.status,
            feasibility_flipped = delta.feasibility_flipped,
            objective_delta = ?delta.objective_delta,
        ),
        TrialOutcome::Failed { error } => warn!(
            event = "trial.finished",
            problem_id = %problem_id,
            trial = %trial.name,
            kind = trial.kind.name(),
            error = %error,
        ),
    }
}

/// Emit event: the run missed a latency target or its deadline (warning level).
pub fn emit_slo_breached(problem_id: &str, slo: &SloCompliance) {
    warn!(
        event = "slo.breached",
        problem_id = %problem_id,
        duration_ms = slo.duration_ms,
        p50_met = slo.p50_met,
        p99_met = slo.p99_met,
        deadline_met = slo.deadline_met,
    );
}

/// Emit event: run finished with its evidence hash.
pub fn emit_run_finished(
    problem_id: &str,
    invocation: u64,
    status: SolverStatus,
    duration_ms: u64,
    canonical_hash: &str,
) {
    info!(
        event = "run.finished",
        problem_id = %problem_id,
        invocation = invocation,
        status = %status,
        duration_ms = duration_ms,
        canonical_hash = %canonical_hash,
    );
}

/// Emit event: run aborted (warning level).
pub fn emit_run_failed(problem_id: &str, invocation: u64, stage: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "run.failed",
        problem_id = %problem_id,
        invocation = invocation,
        stage = %stage,
        error = %error,
    );
}
