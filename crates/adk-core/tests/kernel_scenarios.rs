//! End-to-end kernel scenarios: solver choice, adversarial mode, validation
//! failures and deadline handling, exercised through `DecisionKernel::run`.

use adk_core::{
    canonicalize, AdversarialConfig, Constraint, DecisionKernel, Deadline, ExactSolver,
    HeuristicSolver, KernelError, LinearExpr, ModelKind, Objective, PerturbationKind,
    PerturbationSpec, ProblemModel, QuantumReadySolver, Relation, RunConfig, Solver,
    SolverKind, SolverStatus, TrialOutcome, ValidationError, Variable,
};
use std::time::{Duration, Instant};

const PROBLEM_ID: &str = "ops.thermal/2025-01-15";

/// max 3x + 2y  s.t.  x + y <= 4, 0 <= x <= 3, 0 <= y <= 10.  Optimum 11 at (3, 1).
fn two_var_model() -> ProblemModel {
    ProblemModel::new(
        PROBLEM_ID,
        ModelKind::GeneralMilp,
        Objective::maximize(LinearExpr::new().term("x", 3.0).term("y", 2.0)),
    )
    .with_variable(Variable::continuous("x", Some(0.0), Some(3.0)))
    .with_variable(Variable::continuous("y", Some(0.0), Some(10.0)))
    .with_constraint(Constraint::new(
        "cap",
        LinearExpr::new().term("x", 1.0).term("y", 1.0),
        Relation::Le,
        4.0,
    ))
}

/// max sum(x_i)  s.t.  sum(2 x_i) <= n, x binary, n odd.
///
/// The relaxation always sits half a unit above the integer optimum, so
/// branch-and-bound cannot prune early.
fn parity_knapsack(n: usize) -> ProblemModel {
    let mut objective = LinearExpr::new();
    let mut weight = LinearExpr::new();
    for i in 0..n {
        let name = format!("item_{i:02}");
        objective = objective.term(name.clone(), 1.0);
        weight = weight.term(name, 2.0);
    }
    let mut model = ProblemModel::new(
        "ops.parity/2025-01-15",
        ModelKind::Scheduling,
        Objective::maximize(objective),
    )
    .with_constraint(Constraint::new("capacity", weight, Relation::Le, n as f64));
    for i in 0..n {
        model = model.with_variable(Variable::binary(format!("item_{i:02}")));
    }
    model
}

#[tokio::test]
async fn test_exact_result_is_seed_independent() {
    let kernel = DecisionKernel::new();
    let model = two_var_model();

    let a = kernel
        .run(&RunConfig::new(PROBLEM_ID, SolverKind::Exact, 42), &model)
        .await
        .expect("seed 42");
    let b = kernel
        .run(&RunConfig::new(PROBLEM_ID, SolverKind::Exact, 99), &model)
        .await
        .expect("seed 99");

    assert_eq!(a.result.status, SolverStatus::Optimal);
    assert_eq!(a.result.objective, Some(11.0));
    assert_eq!(a.result.objective, b.result.objective);
    assert_eq!(a.result.assignment, b.result.assignment);
    assert_eq!(a.result.assignment["x"], 3.0);
    assert_eq!(a.result.assignment["y"], 1.0);
    // The seed is part of the config, so the hashes differ.
    assert_ne!(a.evidence.canonical_hash, b.evidence.canonical_hash);
    assert_eq!(b.evidence.invocation, 2);
}

#[test]
fn test_heuristic_outpaces_exact_on_parity_knapsack() {
    let model = canonicalize(&parity_knapsack(11)).expect("canonical");
    let budget = Duration::from_secs(30);

    let started = Instant::now();
    let exact = ExactSolver::default()
        .solve(&model, 42, Deadline::new(budget))
        .expect("exact");
    let exact_elapsed = started.elapsed();

    let started = Instant::now();
    let heuristic = HeuristicSolver::default()
        .solve(&model, 42, Deadline::new(budget))
        .expect("heuristic");
    let heuristic_elapsed = started.elapsed();

    assert_eq!(exact.status, SolverStatus::Optimal);
    assert_eq!(exact.objective, Some(5.0));
    assert!(exact.metrics.nodes_explored > 100);

    assert_eq!(heuristic.status, SolverStatus::Feasible);
    assert!(model.is_feasible_assignment(&heuristic.assignment));
    assert_eq!(heuristic.metrics.nodes_explored, 0);
    assert!(heuristic.objective.expect("objective") <= 5.0);
    assert!(
        heuristic_elapsed < exact_elapsed,
        "heuristic {heuristic_elapsed:?} vs exact {exact_elapsed:?}"
    );
}

#[tokio::test]
async fn test_heuristic_and_quantum_results_are_feasible() {
    let kernel = DecisionKernel::new();
    let raw = parity_knapsack(9);
    let model = canonicalize(&raw).expect("canonical");

    for solver in [SolverKind::Heuristic, SolverKind::QuantumReady] {
        let config = RunConfig::new("ops.parity/2025-01-15", solver, 7);
        let outcome = kernel.run(&config, &raw).await.expect("run");
        assert_eq!(outcome.result.status, SolverStatus::Feasible, "{solver}");
        assert!(model.is_feasible_assignment(&outcome.result.assignment), "{solver}");
    }
}

#[tokio::test]
async fn test_quantum_ready_records_variational_trace() {
    let kernel = DecisionKernel::new();
    let config = RunConfig::new(PROBLEM_ID, SolverKind::QuantumReady, 42);
    let outcome = kernel.run(&config, &two_var_model()).await.expect("run");

    let trace = outcome
        .result
        .metrics
        .variational
        .as_ref()
        .expect("variational trace");
    assert_eq!(trace.betas.len(), trace.gammas.len());
    assert_eq!(outcome.result.metrics.solver, SolverKind::QuantumReady);

    let direct = QuantumReadySolver::default()
        .solve(
            &canonicalize(&two_var_model()).expect("canonical"),
            42,
            Deadline::new(Duration::from_secs(5)),
        )
        .expect("direct");
    assert_eq!(direct.assignment, outcome.result.assignment);
}

#[tokio::test]
async fn test_adversarial_with_no_perturbations() {
    let kernel = DecisionKernel::new();
    let config = RunConfig::new(PROBLEM_ID, SolverKind::Exact, 42)
        .with_adversarial(AdversarialConfig::enabled(Vec::new()));
    let outcome = kernel.run(&config, &two_var_model()).await.expect("run");

    assert!(outcome.evidence.trials.is_empty());
    assert!(outcome.evidence.deterministic);
    assert_eq!(
        outcome.evidence.stages,
        vec!["canonicalizing", "solving", "perturbing", "assuring"]
    );
    assert_eq!(outcome.result.objective, Some(11.0));
}

#[tokio::test]
async fn test_undefined_variable_fails_before_solving() {
    let kernel = DecisionKernel::new();
    let model = two_var_model().with_constraint(Constraint::new(
        "ghost",
        LinearExpr::new().term("z", 1.0),
        Relation::Ge,
        1.0,
    ));
    let config = RunConfig::new(PROBLEM_ID, SolverKind::Exact, 42);

    match kernel.run(&config, &model).await {
        Err(KernelError::Validation(ValidationError::UndefinedVariable { location, name })) => {
            assert_eq!(name, "z");
            assert!(location.contains("ghost"));
        }
        other => panic!("expected UndefinedVariable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_zero_deadline_times_out_and_violates_slo() {
    let kernel = DecisionKernel::new();
    let config = RunConfig::new(PROBLEM_ID, SolverKind::Exact, 42).with_deadline_ms(0);
    let outcome = kernel.run(&config, &two_var_model()).await.expect("run");

    assert_eq!(outcome.result.status, SolverStatus::Timeout);
    assert_eq!(outcome.result.objective, None);
    assert!(outcome.result.assignment.is_empty());
    assert!(!outcome.evidence.slo.deadline_met);
    assert!(outcome.evidence.slo.violated());
}

#[tokio::test]
async fn test_infeasible_model_is_an_ordinary_outcome() {
    let kernel = DecisionKernel::new();
    let model = two_var_model().with_constraint(Constraint::new(
        "floor",
        LinearExpr::new().term("x", 1.0).term("y", 1.0),
        Relation::Ge,
        20.0,
    ));
    let config = RunConfig::new(PROBLEM_ID, SolverKind::Exact, 42);
    let outcome = kernel.run(&config, &model).await.expect("run");

    assert_eq!(outcome.result.status, SolverStatus::Infeasible);
    assert_eq!(outcome.result.objective, None);
    assert!(outcome.evidence.slo.deadline_met);
}

#[tokio::test]
async fn test_safety_critical_quantum_needs_escalation() {
    let kernel = DecisionKernel::new();
    let config = RunConfig::new(PROBLEM_ID, SolverKind::QuantumReady, 42).safety_critical();
    assert!(matches!(
        kernel.run(&config, &two_var_model()).await,
        Err(KernelError::Config(_))
    ));

    let config = config.with_escalation(SolverKind::Exact);
    let outcome = kernel.run(&config, &two_var_model()).await.expect("run");
    assert_eq!(outcome.result.status, SolverStatus::Feasible);
    assert_eq!(outcome.evidence.escalated_from, None);
}

#[tokio::test]
async fn test_trials_are_sorted_and_keep_the_baseline() {
    let kernel = DecisionKernel::new();
    let config = RunConfig::new(PROBLEM_ID, SolverKind::Exact, 42).with_adversarial(
        AdversarialConfig::enabled(vec![
            PerturbationSpec::new("late", PerturbationKind::TimingFault, 1.0),
            PerturbationSpec::new("noisy", PerturbationKind::CoefficientNoise, 0.05),
        ]),
    );
    let outcome = kernel.run(&config, &two_var_model()).await.expect("run");

    let names: Vec<&str> = outcome.evidence.trials.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["late", "noisy"]);
    assert_eq!(outcome.result.status, SolverStatus::Optimal);

    match &outcome.evidence.trials[0].outcome {
        TrialOutcome::Completed { result, delta } => {
            assert_eq!(result.status, SolverStatus::Timeout);
            assert!(delta.feasibility_flipped);
            assert!(delta.status_changed);
        }
        TrialOutcome::Failed { error } => panic!("timing fault failed: {error}"),
    }
}
