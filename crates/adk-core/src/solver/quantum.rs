//! Quantum-ready solver stub.
//!
//! Prepares QAOA-style variational angles (one β/γ pair per layer) as a pure
//! function of the seed and the problem size, then hands the model to the
//! embedded heuristic and returns its status, objective and assignment
//! unchanged. A hardware backend would replace [`QuantumReadySolver::prepare`]
//! only; the fallback contract stays as is.

use std::f64::consts::PI;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::canonical::CanonicalModel;
use crate::domain::config::SolverKind;
use crate::domain::error::SolverError;
use crate::domain::result::{SolverResult, VariationalTrace};
use crate::solver::{elapsed_ms, Deadline, HeuristicSolver, Solver};

const REFINE_STEP: f64 = 0.05;
const MAX_SWEEPS: u64 = 4_096;

#[derive(Debug, Clone)]
pub struct QuantumReadySolver {
    pub fallback: HeuristicSolver,
    /// Upper bound on circuit depth.
    pub max_depth: u32,
}

impl Default for QuantumReadySolver {
    fn default() -> Self {
        Self {
            fallback: HeuristicSolver::default(),
            max_depth: 8,
        }
    }
}

/// Surrogate cost landscape: deeper layers contribute less.
fn surrogate_energy(betas: &[f64], gammas: &[f64]) -> f64 {
    betas
        .iter()
        .zip(gammas)
        .enumerate()
        .map(|(k, (b, g))| -(2.0 * b).sin() * g.sin() / (k as f64 + 1.0))
        .sum()
}

fn wrap(angle: f64, period: f64) -> f64 {
    angle.rem_euclid(period)
}

impl QuantumReadySolver {
    /// Circuit depth for a model with `n` variables and `m` constraints:
    /// `ceil(log2(n + m + 1))`, clamped to `[1, max_depth]`.
    pub fn depth_for(&self, n: usize, m: usize) -> u32 {
        let size = (n + m + 1) as f64;
        let depth = size.log2().ceil() as u32;
        depth.clamp(1, self.max_depth.max(1))
    }

    /// Prepare and refine variational parameters. Deterministic in
    /// `(seed, n, m)` unless the deadline cuts refinement short.
    pub fn prepare(&self, model: &CanonicalModel, seed: u64, deadline: &Deadline) -> VariationalTrace {
        let n = model.num_variables();
        let m = model.num_constraints();
        let depth = self.depth_for(n, m);

        let mixed = seed
            ^ (n as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ (m as u64).rotate_left(32);
        let mut rng = ChaCha8Rng::seed_from_u64(mixed);
        let mut betas: Vec<f64> = (0..depth).map(|_| rng.gen_range(0.0..PI)).collect();
        let mut gammas: Vec<f64> = (0..depth).map(|_| rng.gen_range(0.0..2.0 * PI)).collect();

        let target = (u64::from(depth) * n.max(1) as u64).min(MAX_SWEEPS);
        let mut energy = surrogate_energy(&betas, &gammas);
        let mut sweeps = 0u64;
        while sweeps < target {
            if deadline.expired() {
                break;
            }
            sweeps += 1;
            let mut moved = false;
            for k in 0..betas.len() {
                for delta in [REFINE_STEP, -REFINE_STEP] {
                    let previous = betas[k];
                    betas[k] = wrap(previous + delta, PI);
                    let e = surrogate_energy(&betas, &gammas);
                    if e < energy {
                        energy = e;
                        moved = true;
                    } else {
                        betas[k] = previous;
                    }

                    let previous = gammas[k];
                    gammas[k] = wrap(previous + delta, 2.0 * PI);
                    let e = surrogate_energy(&betas, &gammas);
                    if e < energy {
                        energy = e;
                        moved = true;
                    } else {
                        gammas[k] = previous;
                    }
                }
            }
            if !moved {
                break;
            }
        }

        VariationalTrace {
            depth,
            betas,
            gammas,
            surrogate_energy: energy,
            sweeps,
        }
    }
}

impl Solver for QuantumReadySolver {
    fn kind(&self) -> SolverKind {
        SolverKind::QuantumReady
    }

    fn solve(
        &self,
        model: &CanonicalModel,
        seed: u64,
        deadline: Deadline,
    ) -> Result<SolverResult, SolverError> {
        let started = Instant::now();
        let trace = self.prepare(model, seed, &deadline);
        debug!(
            depth = trace.depth,
            sweeps = trace.sweeps,
            energy = trace.surrogate_energy,
            "variational parameters prepared"
        );

        let mut result = self.fallback.solve(model, seed, deadline)?;
        result.metrics.solver = SolverKind::QuantumReady;
        result.metrics.iterations += trace.sweeps;
        result.metrics.variational = Some(trace);
        result.metrics.duration_ms = elapsed_ms(started);
        Ok(result)
    }
}
