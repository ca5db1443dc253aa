//! Solver outcomes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::config::SolverKind;

/// Closed set of solver outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    Optimal,
    Feasible,
    Infeasible,
    Timeout,
    Error,
}

impl SolverStatus {
    /// Whether the result carries a usable assignment.
    pub fn has_solution(self) -> bool {
        matches!(self, SolverStatus::Optimal | SolverStatus::Feasible)
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolverStatus::Optimal => "optimal",
            SolverStatus::Feasible => "feasible",
            SolverStatus::Infeasible => "infeasible",
            SolverStatus::Timeout => "timeout",
            SolverStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Variational parameters prepared by the quantum-ready solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationalTrace {
    /// Circuit depth `p` (number of layers).
    pub depth: u32,
    /// Mixer angles, one per layer.
    pub betas: Vec<f64>,
    /// Cost angles, one per layer.
    pub gammas: Vec<f64>,
    /// Surrogate energy after refinement.
    pub surrogate_energy: f64,
    /// Refinement sweeps performed.
    pub sweeps: u64,
}

/// Solver-internal measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverMetrics {
    pub solver: SolverKind,
    /// Wall-clock duration. Excluded from evidence hashing.
    pub duration_ms: u64,
    /// Simplex pivots, repair moves or refinement sweeps depending on the solver.
    pub iterations: u64,
    /// Branch-and-bound nodes (exact solver only).
    #[serde(default)]
    pub nodes_explored: u64,
    #[serde(default)]
    pub variational: Option<VariationalTrace>,
}

impl SolverMetrics {
    pub fn new(solver: SolverKind) -> Self {
        Self {
            solver,
            duration_ms: 0,
            iterations: 0,
            nodes_explored: 0,
            variational: None,
        }
    }
}

/// Result of one solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverResult {
    pub status: SolverStatus,
    /// `None` for infeasible, error, and timeout without incumbent.
    pub objective: Option<f64>,
    /// Variable name → value, in canonical (sorted) order.
    pub assignment: BTreeMap<String, f64>,
    pub metrics: SolverMetrics,
    #[serde(default)]
    pub message: Option<String>,
}

impl SolverResult {
    pub fn solved(
        status: SolverStatus,
        objective: f64,
        assignment: BTreeMap<String, f64>,
        metrics: SolverMetrics,
    ) -> Self {
        Self {
            status,
            objective: Some(objective),
            assignment,
            metrics,
            message: None,
        }
    }

    /// A result without an assignment (infeasible, timeout, error).
    pub fn unsolved(status: SolverStatus, metrics: SolverMetrics, message: impl Into<String>) -> Self {
        Self {
            status,
            objective: None,
            assignment: BTreeMap::new(),
            metrics,
            message: Some(message.into()),
        }
    }

    /// The deterministic part of the result, used for evidence hashing.
    pub fn fingerprint(&self) -> ResultFingerprint<'_> {
        ResultFingerprint {
            status: self.status,
            objective: self.objective,
            assignment: &self.assignment,
            solver: self.metrics.solver,
            iterations: self.metrics.iterations,
            nodes_explored: self.metrics.nodes_explored,
            variational: self.metrics.variational.as_ref(),
        }
    }
}

/// Hashable view of a [`SolverResult`]: everything except wall-clock timing.
#[derive(Debug, Serialize)]
pub struct ResultFingerprint<'a> {
    pub status: SolverStatus,
    pub objective: Option<f64>,
    pub assignment: &'a BTreeMap<String, f64>,
    pub solver: SolverKind,
    pub iterations: u64,
    pub nodes_explored: u64,
    pub variational: Option<&'a VariationalTrace>,
}
