//! Observability tests for kernel run lifecycle tracing.
//!
//! These tests verify that structured tracing events are emitted for the key
//! lifecycle points: run start, stage entry, solver return, trials, SLO
//! breaches and run finish or failure.

use adk_core::obs::{
    emit_run_failed, emit_run_finished, emit_run_started, emit_slo_breached, emit_stage_entered,
    RunSpan,
};
use adk_core::{
    AdversarialConfig, Constraint, DecisionKernel, KernelError, LinearExpr, ModelKind, Objective,
    PerturbationKind, PerturbationSpec, ProblemModel, Relation, RunConfig, SloCompliance,
    SloTargets, SolverKind, SolverStatus, Variable,
};
use tracing_test::traced_test;

const PROBLEM_ID: &str = "ops.obs/2025-01-15";

fn model() -> ProblemModel {
    ProblemModel::new(
        PROBLEM_ID,
        ModelKind::GeneralMilp,
        Objective::maximize(LinearExpr::new().term("x", 1.0)),
    )
    .with_variable(Variable::integer("x", Some(0.0), Some(9.0)))
    .with_constraint(Constraint::new(
        "cap",
        LinearExpr::new().term("x", 2.0),
        Relation::Le,
        7.0,
    ))
}

#[traced_test]
#[test]
fn test_emit_run_started_logs_solver() {
    emit_run_started("ops.obs/run-123", 1, SolverKind::Heuristic);
    assert!(logs_contain("run.started"));
    assert!(logs_contain("heuristic"));
}

#[traced_test]
#[test]
fn test_emit_stage_entered_logs_stage() {
    emit_stage_entered("ops.obs/run-456", "perturbing");
    assert!(logs_contain("stage.entered"));
    assert!(logs_contain("perturbing"));
}

#[traced_test]
#[test]
fn test_emit_run_finished_logs_hash() {
    emit_run_finished("ops.obs/run-789", 3, SolverStatus::Optimal, 12, "ab12cd");
    assert!(logs_contain("run.finished"));
    assert!(logs_contain("ab12cd"));
}

#[traced_test]
#[test]
fn test_emit_slo_breached_logs_warning() {
    let slo = SloCompliance::measure(2_000, &SloTargets::default(), SolverStatus::Feasible);
    emit_slo_breached("ops.obs/run-slo", &slo);
    assert!(logs_contain("slo.breached"));
    assert!(logs_contain("WARN"));
}

#[traced_test]
#[test]
fn test_emit_run_failed_logs_error() {
    let err = KernelError::Config("problem_id cannot be empty".to_string());
    emit_run_failed("ops.obs/run-err", 4, "canonicalizing", &err);
    assert!(logs_contain("run.failed"));
    assert!(logs_contain("problem_id cannot be empty"));
}

#[traced_test]
#[test]
fn test_run_span_enter_creates_span() {
    let span = RunSpan::enter("ops.obs/span", 9);
    tracing::info!("inside run span");
    drop(span);
    assert!(logs_contain("adk.run"));
}

#[traced_test]
#[tokio::test]
async fn test_kernel_run_emits_lifecycle_events() {
    let kernel = DecisionKernel::new();
    let config = RunConfig::new(PROBLEM_ID, SolverKind::Exact, 42).with_adversarial(
        AdversarialConfig::enabled(vec![PerturbationSpec::of_kind(
            PerturbationKind::SpoofedInput,
            0.2,
        )]),
    );
    let outcome = kernel.run(&config, &model()).await.expect("run");
    assert_eq!(outcome.result.objective, Some(3.0));

    assert!(logs_contain("run.started"));
    assert!(logs_contain("stage.entered"));
    assert!(logs_contain("solver.finished"));
    assert!(logs_contain("trial.finished"));
    assert!(logs_contain("run.finished"));
    assert!(logs_contain(&outcome.evidence.canonical_hash));
}

#[traced_test]
#[tokio::test]
async fn test_kernel_failure_emits_run_failed() {
    let kernel = DecisionKernel::new();
    let config = RunConfig::new("ops.obs/elsewhere", SolverKind::Exact, 42);
    assert!(kernel.run(&config, &model()).await.is_err());

    assert!(logs_contain("run.started"));
    assert!(logs_contain("run.failed"));
    assert!(!logs_contain("run.finished"));
}
