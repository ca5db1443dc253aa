//! ADK Core Library
//!
//! Auditable decision kernel: canonicalizes a problem model, solves it with
//! an exact, heuristic or quantum-ready strategy, probes the result with
//! adversarial perturbations and emits a tamper-evident evidence record.

pub mod adversarial;
pub mod canonical;
pub mod domain;
pub mod evidence;
pub mod kernel;
pub mod manifest;
pub mod metrics;
pub mod obs;
pub mod solver;
pub mod telemetry;

pub use domain::{
    AdversarialConfig, Constraint, KernelError, LinearExpr, ModelKind, Objective,
    PerturbationKind, PerturbationSpec, ProblemModel, Relation, Result, RunConfig, Sense,
    SloTargets, SolverError, SolverKind, SolverMetrics, SolverResult, SolverStatus, Term,
    ValidationError, VarType, Variable, VariationalTrace,
};

pub use canonical::{canonical_digest, canonicalize, CanonicalModel, FEASIBILITY_TOL};

pub use solver::{
    solver_for, Deadline, ExactSolver, HeuristicSolver, QuantumReadySolver, Solver,
};

pub use adversarial::{run_trials, PerturbationTrial, RobustnessDelta, TrialOutcome};

pub use evidence::{
    EvidenceBuilder, EvidenceDraft, EvidenceRecord, EvidenceSink, FsEvidenceSink,
    MemoryEvidenceSink, SloCompliance,
};

pub use kernel::{DecisionKernel, KernelEvent, KernelOutcome, KernelState};

pub use manifest::{ManifestAdversarial, RunManifest};

pub use metrics::METRICS;
pub use telemetry::init_tracing;
