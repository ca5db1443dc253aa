//! Seeded repair-and-improve heuristic.
//!
//! Phase one repairs violated constraints one move at a time, starting from
//! the point closest to the origin. Phase two walks each variable in the
//! objective-improving direction as far as the ratio test allows. The result
//! is at best `feasible`: the heuristic never claims optimality.

use std::time::Instant;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::canonical::{CanonicalConstraint, CanonicalModel};
use crate::domain::config::SolverKind;
use crate::domain::error::SolverError;
use crate::domain::model::{Relation, Sense};
use crate::domain::result::{SolverMetrics, SolverResult, SolverStatus};
use crate::solver::{elapsed_ms, Deadline, Solver};

const STEP_TOL: f64 = 1e-12;

/// Probability of repairing a random violated constraint instead of the worst.
const EXPLORE_PROBABILITY: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct HeuristicSolver {
    /// Repair moves before giving up on feasibility.
    pub max_moves: u64,
    /// Full improvement passes over the variables.
    pub improvement_passes: u32,
}

impl Default for HeuristicSolver {
    fn default() -> Self {
        Self {
            max_moves: 10_000,
            improvement_passes: 50,
        }
    }
}

fn total_violation(constraints: &[CanonicalConstraint], values: &[f64]) -> f64 {
    constraints.iter().map(|c| c.violation(values)).sum()
}

/// Activity range of a constraint over the variable bounds.
fn activity_range(model: &CanonicalModel, c: &CanonicalConstraint) -> (f64, f64) {
    let vars = model.variables();
    c.terms.iter().fold((0.0, 0.0), |(lo, hi), t| {
        let var = &vars[t.index];
        let l = var.lower.unwrap_or(f64::NEG_INFINITY);
        let u = var.upper.unwrap_or(f64::INFINITY);
        let (a, b) = if t.coef >= 0.0 {
            (t.coef * l, t.coef * u)
        } else {
            (t.coef * u, t.coef * l)
        };
        (lo + a, hi + b)
    })
}

/// First constraint that cannot be satisfied anywhere inside the bounds.
fn proven_infeasible(model: &CanonicalModel) -> Option<&str> {
    model.constraints().iter().find_map(|c| {
        let (lo, hi) = activity_range(model, c);
        let tol = c.tolerance();
        let impossible = match c.relation {
            Relation::Le => lo > c.rhs + tol,
            Relation::Ge => hi < c.rhs - tol,
            Relation::Eq => lo > c.rhs + tol || hi < c.rhs - tol,
        };
        impossible.then_some(c.name.as_str())
    })
}

impl HeuristicSolver {
    fn initial_point(model: &CanonicalModel) -> Vec<f64> {
        model
            .variables()
            .iter()
            .map(|v| {
                let x = v.clamp(0.0);
                if v.var_type.is_integral() {
                    v.clamp(x.round())
                } else {
                    x
                }
            })
            .collect()
    }

    /// Candidate value for variable `j` that closes `need` units of activity
    /// through coefficient `coef`.
    fn candidate(model: &CanonicalModel, values: &[f64], j: usize, coef: f64, need: f64) -> f64 {
        let var = &model.variables()[j];
        let mut delta = need / coef;
        if var.var_type.is_integral() {
            delta = delta.signum() * delta.abs().ceil();
        }
        let moved = var.clamp(values[j] + delta);
        if var.var_type.is_integral() {
            moved.round()
        } else {
            moved
        }
    }

    /// One repair move. Returns false when the constraint offers no move at all.
    fn repair_step(
        model: &CanonicalModel,
        values: &mut [f64],
        target: usize,
        rng: &mut ChaCha8Rng,
    ) -> bool {
        let constraints = model.constraints();
        let c = &constraints[target];
        let need = c.rhs - c.activity(values);
        let current = total_violation(constraints, values);

        let mut moves: Vec<(usize, f64, f64)> = Vec::new();
        for t in &c.terms {
            let j = t.index;
            let next = Self::candidate(model, values, j, t.coef, need);
            if next == values[j] {
                continue;
            }
            let previous = values[j];
            values[j] = next;
            let score = total_violation(constraints, values);
            values[j] = previous;
            moves.push((j, next, score));
        }
        if moves.is_empty() {
            return false;
        }

        let best = moves
            .iter()
            .map(|&(_, _, score)| score)
            .fold(f64::INFINITY, f64::min);
        let pick = if best < current - STEP_TOL {
            let ties: Vec<&(usize, f64, f64)> = moves
                .iter()
                .filter(|m| m.2 <= best + STEP_TOL)
                .collect();
            ties.choose(rng).copied()
        } else {
            // No improving move: random walk.
            moves.choose(rng)
        };
        if let Some(&(j, next, _)) = pick {
            values[j] = next;
        }
        true
    }

    /// Largest objective-improving step for variable `j` that keeps `values`
    /// feasible, or `None` when the step would be unbounded.
    fn ratio_test(
        model: &CanonicalModel,
        columns: &[Vec<(usize, f64)>],
        values: &[f64],
        j: usize,
        dir: f64,
    ) -> Option<f64> {
        let var = &model.variables()[j];
        let mut step = if dir > 0.0 {
            var.upper.map_or(f64::INFINITY, |u| u - values[j])
        } else {
            var.lower.map_or(f64::INFINITY, |l| values[j] - l)
        };
        for &(ci, a) in &columns[j] {
            let c = &model.constraints()[ci];
            let rate = a * dir;
            let lhs = c.activity(values);
            let limit = match c.relation {
                Relation::Eq => 0.0,
                Relation::Le if rate > 0.0 => (c.rhs - lhs) / rate,
                Relation::Ge if rate < 0.0 => (lhs - c.rhs) / -rate,
                _ => continue,
            };
            step = step.min(limit.max(0.0));
        }
        if var.var_type.is_integral() {
            step = (step + 1e-9).floor();
        }
        step.is_finite().then_some(step)
    }
}

impl Solver for HeuristicSolver {
    fn kind(&self) -> SolverKind {
        SolverKind::Heuristic
    }

    fn solve(
        &self,
        model: &CanonicalModel,
        seed: u64,
        deadline: Deadline,
    ) -> Result<SolverResult, SolverError> {
        let started = Instant::now();
        let mut metrics = SolverMetrics::new(SolverKind::Heuristic);

        if deadline.expired() {
            return Ok(SolverResult::unsolved(
                SolverStatus::Timeout,
                metrics,
                "deadline elapsed before the search started",
            ));
        }
        if let Some(name) = proven_infeasible(model) {
            metrics.duration_ms = elapsed_ms(started);
            return Ok(SolverResult::unsolved(
                SolverStatus::Infeasible,
                metrics,
                format!("constraint {name} cannot be satisfied within the variable bounds"),
            ));
        }

        let n = model.num_variables();
        let constraints = model.constraints();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut values = Self::initial_point(model);
        if values.iter().any(|x| !x.is_finite()) {
            return Err(SolverError::Malformed(
                "initial point is not finite".to_string(),
            ));
        }

        // Phase one: repair.
        let mut timed_out = false;
        let mut moves = 0u64;
        loop {
            let violated: Vec<usize> = constraints
                .iter()
                .enumerate()
                .filter(|(_, c)| c.violation(&values) > c.tolerance())
                .map(|(i, _)| i)
                .collect();
            if violated.is_empty() || moves >= self.max_moves {
                break;
            }
            if deadline.expired() {
                timed_out = true;
                break;
            }
            moves += 1;

            let target = if rng.gen_bool(EXPLORE_PROBABILITY) {
                violated[rng.gen_range(0..violated.len())]
            } else {
                let mut worst = violated[0];
                for &i in &violated[1..] {
                    if constraints[i].violation(&values) > constraints[worst].violation(&values) {
                        worst = i;
                    }
                }
                worst
            };
            Self::repair_step(model, &mut values, target, &mut rng);
        }
        metrics.iterations = moves;

        if !model.is_feasible(&values) {
            metrics.duration_ms = elapsed_ms(started);
            let result = if timed_out {
                SolverResult::unsolved(
                    SolverStatus::Timeout,
                    metrics,
                    "deadline elapsed before a feasible point was found",
                )
            } else {
                SolverResult::unsolved(
                    SolverStatus::Error,
                    metrics,
                    format!("no feasible point found after {moves} repair moves"),
                )
            };
            return Ok(result);
        }
        debug!(moves, "heuristic repair reached feasibility");

        // Phase two: improve.
        let repaired = values.clone();
        let mut cost = vec![0.0; n];
        for t in &model.objective().terms {
            cost[t.index] += t.coef;
        }
        let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for (ci, c) in constraints.iter().enumerate() {
            for t in &c.terms {
                columns[t.index].push((ci, t.coef));
            }
        }
        let mut order: Vec<usize> = (0..n).collect();
        let mut steps = 0u64;
        'passes: for _ in 0..self.improvement_passes {
            order.shuffle(&mut rng);
            let mut improved = false;
            for &j in &order {
                if deadline.expired() {
                    break 'passes;
                }
                if cost[j] == 0.0 {
                    continue;
                }
                let dir = match model.objective().sense {
                    Sense::Minimize => -cost[j].signum(),
                    Sense::Maximize => cost[j].signum(),
                };
                match Self::ratio_test(model, &columns, &values, j, dir) {
                    Some(step) if step > STEP_TOL => {
                        values[j] += dir * step;
                        steps += 1;
                        improved = true;
                    }
                    _ => {}
                }
            }
            if !improved {
                break;
            }
        }
        metrics.iterations += steps;

        if !model.is_feasible(&values) {
            values = repaired;
        }
        metrics.duration_ms = elapsed_ms(started);
        let objective = model.evaluate_objective(&values);
        Ok(SolverResult::solved(
            SolverStatus::Feasible,
            objective,
            model.to_assignment(&values),
            metrics,
        ))
    }
}
