//! Domain models for the decision kernel.
//!
//! Canonical definitions for the core entities:
//! - `ProblemModel`: caller-supplied variables, constraints and objective
//! - `RunConfig`: solver choice, seed, adversarial settings and budgets
//! - `SolverResult`: status, objective, assignment and solver metrics

pub mod config;
pub mod digest;
pub mod error;
pub mod model;
pub mod result;

pub use config::{
    AdversarialConfig, PerturbationKind, PerturbationSpec, RunConfig, SloTargets, SolverKind,
};
pub use error::{KernelError, Result, SolverError, ValidationError};
pub use model::{
    Constraint, LinearExpr, ModelKind, Objective, ProblemModel, Relation, Sense, Term, VarType,
    Variable,
};
pub use result::{ResultFingerprint, SolverMetrics, SolverResult, SolverStatus, VariationalTrace};
