//! Solver strategies.
//!
//! Three interchangeable implementations of [`Solver`], selected per run by
//! [`SolverKind`]:
//!
//! - [`exact`]: LP relaxation via [`simplex`] + depth-first branch-and-bound
//! - [`heuristic`]: seeded repair + ratio-test local search, feasibility only
//! - [`quantum`]: variational parameter preparation, heuristic fallback
//!
//! Solvers never escalate to one another; that is the orchestrator's call.

pub mod exact;
pub mod heuristic;
pub mod quantum;
pub mod simplex;

use std::time::{Duration, Instant};

use crate::canonical::CanonicalModel;
use crate::domain::config::SolverKind;
use crate::domain::error::SolverError;
use crate::domain::result::SolverResult;

pub use exact::ExactSolver;
pub use heuristic::HeuristicSolver;
pub use quantum::QuantumReadySolver;

/// Wall-clock budget for one solve.
///
/// A zero budget is valid and already expired; negative budgets are rejected.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// Build from a signed millisecond budget as found in run configs.
    pub fn from_millis(budget_ms: i64) -> Result<Self, SolverError> {
        let ms = u64::try_from(budget_ms)
            .map_err(|_| SolverError::DeadlineExceeded { budget_ms })?;
        Ok(Self::new(Duration::from_millis(ms)))
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    /// A fresh deadline with the budget scaled by `factor` (clamped to `[0, 1]`).
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.budget.mul_f64(factor.clamp(0.0, 1.0)))
    }
}

/// One capability, many strategies.
pub trait Solver: Send + Sync {
    fn kind(&self) -> SolverKind;

    /// Solve `model`. Infeasibility and timeouts are results, not errors.
    fn solve(
        &self,
        model: &CanonicalModel,
        seed: u64,
        deadline: Deadline,
    ) -> Result<SolverResult, SolverError>;
}

/// Solver implementation for a configured kind, with default tuning.
pub fn solver_for(kind: SolverKind) -> Box<dyn Solver> {
    match kind {
        SolverKind::Exact => Box::new(ExactSolver::default()),
        SolverKind::Heuristic => Box::new(HeuristicSolver::default()),
        SolverKind::QuantumReady => Box::new(QuantumReadySolver::default()),
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
