//! Evidence hashes depend only on the model, the config and the deterministic
//! part of the results.

use adk_core::{
    canonical_digest, canonicalize, solver_for, AdversarialConfig, Constraint, DecisionKernel,
    Deadline, EvidenceBuilder, LinearExpr, ModelKind, Objective, PerturbationKind,
    PerturbationSpec, ProblemModel, Relation, RunConfig, SolverKind, Variable,
};
use std::time::Duration;

const PROBLEM_ID: &str = "grid.dispatch/2025-03-02";

fn variables() -> Vec<Variable> {
    vec![
        Variable::integer("gas", Some(0.0), Some(40.0)),
        Variable::integer("hydro", Some(0.0), Some(25.0)),
        Variable::continuous("solar", Some(0.0), Some(15.0)),
    ]
}

fn constraints() -> Vec<Constraint> {
    vec![
        Constraint::new(
            "demand",
            LinearExpr::new()
                .term("gas", 1.0)
                .term("hydro", 1.0)
                .term("solar", 1.0),
            Relation::Ge,
            52.5,
        ),
        Constraint::new(
            "emissions",
            LinearExpr::new().term("gas", 0.9).term("hydro", 0.1),
            Relation::Le,
            30.0,
        ),
        Constraint::new(
            "reservoir",
            LinearExpr::new().term("hydro", 2.0).term("solar", -1.0),
            Relation::Le,
            40.0,
        ),
    ]
}

fn dispatch_model(reversed: bool) -> ProblemModel {
    let mut vars = variables();
    let mut cons = constraints();
    if reversed {
        vars.reverse();
        cons.reverse();
    }
    let mut model = ProblemModel::new(
        PROBLEM_ID,
        ModelKind::Other("dispatch".to_string()),
        Objective::minimize(
            LinearExpr::new()
                .term("gas", 4.0)
                .term("hydro", 2.5)
                .term("solar", 1.0),
        ),
    )
    .with_metadata("region", "north");
    for v in vars {
        model = model.with_variable(v);
    }
    for c in cons {
        model = model.with_constraint(c);
    }
    model
}

fn adversarial_config(solver: SolverKind) -> RunConfig {
    RunConfig::new(PROBLEM_ID, solver, 42).with_adversarial(AdversarialConfig::enabled(vec![
        PerturbationSpec::of_kind(PerturbationKind::CoefficientNoise, 0.05),
        PerturbationSpec::of_kind(PerturbationKind::SpoofedInput, 0.1),
    ]))
}

#[tokio::test]
async fn test_repeated_runs_share_a_hash() {
    let kernel = DecisionKernel::new();
    let model = dispatch_model(false);

    for solver in [SolverKind::Exact, SolverKind::Heuristic, SolverKind::QuantumReady] {
        let config = adversarial_config(solver);
        let first = kernel.run(&config, &model).await.expect("first run");
        let second = kernel.run(&config, &model).await.expect("second run");
        assert_eq!(
            first.evidence.canonical_hash, second.evidence.canonical_hash,
            "{solver}"
        );
        assert_ne!(first.evidence.record_id, second.evidence.record_id);
        assert_eq!(first.evidence.trials.len(), 2);
    }
}

#[tokio::test]
async fn test_hash_ignores_declaration_order() {
    assert_eq!(
        canonical_digest(&dispatch_model(false)).expect("digest"),
        canonical_digest(&dispatch_model(true)).expect("digest")
    );

    let kernel = DecisionKernel::new();
    let config = adversarial_config(SolverKind::Exact);
    let a = kernel.run(&config, &dispatch_model(false)).await.expect("run");
    let b = kernel.run(&config, &dispatch_model(true)).await.expect("run");
    assert_eq!(a.evidence.canonical_hash, b.evidence.canonical_hash);
    assert_eq!(a.evidence.model_digest, b.evidence.model_digest);
    assert_eq!(a.result.assignment, b.result.assignment);
}

#[tokio::test]
async fn test_trials_leave_the_baseline_reproducible() {
    let kernel = DecisionKernel::new();
    let model = dispatch_model(false);
    let before = model.clone();

    let config = adversarial_config(SolverKind::Heuristic);
    let outcome = kernel.run(&config, &model).await.expect("run");
    assert_eq!(model, before);

    let canonical = canonicalize(&model).expect("canonical");
    let replay = solver_for(SolverKind::Heuristic)
        .solve(&canonical, 42, Deadline::new(Duration::from_secs(5)))
        .expect("replay");
    assert_eq!(replay.status, outcome.result.status);
    assert_eq!(replay.objective, outcome.result.objective);
    assert_eq!(replay.assignment, outcome.result.assignment);
    if replay.status.has_solution() {
        assert!(canonical.is_feasible_assignment(&replay.assignment));
    }
}

#[tokio::test]
async fn test_published_record_verifies() {
    let kernel = DecisionKernel::new();
    let model = dispatch_model(true);
    let outcome = kernel
        .run(&adversarial_config(SolverKind::Exact), &model)
        .await
        .expect("run");

    let json = serde_json::to_string(&outcome.evidence).expect("serialize");
    let restored = serde_json::from_str(&json).expect("deserialize");
    let canonical = canonicalize(&dispatch_model(false)).expect("canonical");
    EvidenceBuilder::verify(&restored, &canonical).expect("verify");
}
