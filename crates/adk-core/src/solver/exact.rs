//! Exact MILP solver: simplex relaxation + depth-first branch-and-bound.
//!
//! Branching picks the first fractional integral variable in canonical order
//! and explores the floor branch first. The search order depends only on the
//! model, so the seed has no influence on the result.

use std::time::Instant;

use tracing::debug;

use crate::canonical::CanonicalModel;
use crate::domain::config::SolverKind;
use crate::domain::error::SolverError;
use crate::domain::model::Sense;
use crate::domain::result::{SolverMetrics, SolverResult, SolverStatus};
use crate::solver::simplex::{LinearProgram, LpOutcome};
use crate::solver::{elapsed_ms, Deadline, Solver};

const INTEGRALITY_TOL: f64 = 1e-6;

/// Branch-and-bound MILP solver.
#[derive(Debug, Clone)]
pub struct ExactSolver {
    /// Nodes explored before the search is cut short like a timeout.
    pub node_limit: u64,
    /// Simplex pivots allowed per node.
    pub pivot_limit: u64,
}

impl Default for ExactSolver {
    fn default() -> Self {
        Self {
            node_limit: 200_000,
            pivot_limit: 50_000,
        }
    }
}

struct Node {
    lower: Vec<Option<f64>>,
    upper: Vec<Option<f64>>,
}

struct Incumbent {
    values: Vec<f64>,
    /// Minimization-form objective.
    bound: f64,
}

impl ExactSolver {
    fn first_fractional(model: &CanonicalModel, values: &[f64]) -> Option<(usize, f64)> {
        for (j, (var, &x)) in model.variables().iter().zip(values).enumerate() {
            if var.var_type.is_integral() && (x - x.round()).abs() > INTEGRALITY_TOL {
                return Some((j, x));
            }
        }
        None
    }

    /// Round integral variables onto their integer values.
    fn polish(model: &CanonicalModel, values: &[f64]) -> Vec<f64> {
        model
            .variables()
            .iter()
            .zip(values)
            .map(|(var, &x)| {
                if var.var_type.is_integral() {
                    var.clamp(x.round())
                } else {
                    x
                }
            })
            .collect()
    }
}

impl Solver for ExactSolver {
    fn kind(&self) -> SolverKind {
        SolverKind::Exact
    }

    fn solve(
        &self,
        model: &CanonicalModel,
        _seed: u64,
        deadline: Deadline,
    ) -> Result<SolverResult, SolverError> {
        let started = Instant::now();
        let mut metrics = SolverMetrics::new(SolverKind::Exact);

        let relaxation = LinearProgram::relaxation(model);
        if relaxation.costs.len() != model.num_variables() {
            return Err(SolverError::Malformed(
                "relaxation dimension does not match the model".to_string(),
            ));
        }

        let sign = match model.objective().sense {
            Sense::Minimize => 1.0,
            Sense::Maximize => -1.0,
        };

        let mut stack = vec![Node {
            lower: relaxation.lower.clone(),
            upper: relaxation.upper.clone(),
        }];
        let mut incumbent: Option<Incumbent> = None;
        let mut cut_short = false;

        while let Some(node) = stack.pop() {
            if deadline.expired() || metrics.nodes_explored >= self.node_limit {
                cut_short = true;
                break;
            }
            metrics.nodes_explored += 1;

            let lp = LinearProgram {
                lower: node.lower.clone(),
                upper: node.upper.clone(),
                ..relaxation.clone()
            };
            let solution = lp.solve(&deadline, self.pivot_limit);
            metrics.iterations += solution.pivots;

            let (values, bound) = match solution.outcome {
                LpOutcome::Infeasible => continue,
                LpOutcome::Timeout => {
                    cut_short = true;
                    break;
                }
                LpOutcome::Unbounded => {
                    metrics.duration_ms = elapsed_ms(started);
                    return Ok(SolverResult::unsolved(
                        SolverStatus::Error,
                        metrics,
                        "objective is unbounded over the feasible region",
                    ));
                }
                LpOutcome::Optimal { values, objective } => (values, objective),
            };

            if let Some(best) = &incumbent {
                if bound >= best.bound - 1e-9 * best.bound.abs().max(1.0) {
                    continue;
                }
            }

            match Self::first_fractional(model, &values) {
                None => {
                    let polished = Self::polish(model, &values);
                    let bound = sign * model.evaluate_objective(&polished);
                    debug!(node = metrics.nodes_explored, bound, "new incumbent");
                    incumbent = Some(Incumbent {
                        values: polished,
                        bound,
                    });
                }
                Some((j, x)) => {
                    let mut up = Node {
                        lower: node.lower.clone(),
                        upper: node.upper.clone(),
                    };
                    up.lower[j] = Some(x.ceil());
                    let mut down = node;
                    down.upper[j] = Some(x.floor());
                    // LIFO: push ceil first so the floor branch is explored first.
                    stack.push(up);
                    stack.push(down);
                }
            }
        }

        metrics.duration_ms = elapsed_ms(started);
        let result = match (incumbent, cut_short) {
            (Some(best), cut_short) => {
                let status = if cut_short {
                    SolverStatus::Feasible
                } else {
                    SolverStatus::Optimal
                };
                let objective = model.evaluate_objective(&best.values);
                SolverResult::solved(status, objective, model.to_assignment(&best.values), metrics)
            }
            (None, true) => SolverResult::unsolved(
                SolverStatus::Timeout,
                metrics,
                "deadline elapsed before an incumbent was found",
            ),
            (None, false) => SolverResult::unsolved(
                SolverStatus::Infeasible,
                metrics,
                "no assignment satisfies every constraint",
            ),
        };
        Ok(result)
    }
}
