//! Perturbation generators.
//!
//! Every generator works on a clone of the canonical model and draws from an
//! RNG keyed by `(seed, trial name)`, so a trial's perturbation does not
//! depend on which other trials run or in which order.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalModel;
use crate::domain::config::{PerturbationKind, PerturbationSpec};
use crate::solver::Deadline;

/// RNG for one trial: `seed` mixed with the first 8 bytes of SHA-256(name).
pub fn trial_rng(seed: u64, name: &str) -> ChaCha8Rng {
    let hash = Sha256::digest(name.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash[..8]);
    ChaCha8Rng::seed_from_u64(seed ^ u64::from_le_bytes(prefix))
}

/// A perturbed copy of the model together with the trial's deadline.
#[derive(Debug, Clone)]
pub struct Perturbed {
    pub model: CanonicalModel,
    pub deadline: Deadline,
}

/// Multiplicative noise `a * (1 + m * u)`, `u` uniform in `[-1, 1]`, on every
/// constraint and objective coefficient.
pub fn coefficient_noise(model: &CanonicalModel, magnitude: f64, rng: &mut ChaCha8Rng) -> CanonicalModel {
    let mut out = model.clone();
    for c in out.constraints_mut() {
        for t in &mut c.terms {
            t.coef *= 1.0 + magnitude * rng.gen_range(-1.0..=1.0);
        }
    }
    for t in &mut out.objective_mut().terms {
        t.coef *= 1.0 + magnitude * rng.gen_range(-1.0..=1.0);
    }
    out
}

/// Right-hand sides pushed up or down by `m * max(1, |b|)`.
pub fn spoofed_input(model: &CanonicalModel, magnitude: f64, rng: &mut ChaCha8Rng) -> CanonicalModel {
    let mut out = model.clone();
    for c in out.constraints_mut() {
        let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        c.rhs += sign * magnitude * c.rhs.abs().max(1.0);
    }
    out
}

/// Apply `spec` to a clone of `model`. `budget` is the baseline solver budget;
/// each trial starts its own clock.
pub fn apply(model: &CanonicalModel, spec: &PerturbationSpec, seed: u64, budget: Duration) -> Perturbed {
    let mut rng = trial_rng(seed, &spec.name);
    let magnitude = spec.magnitude.clamp(0.0, 1.0);
    let full = Deadline::new(budget);
    match spec.kind {
        PerturbationKind::CoefficientNoise => Perturbed {
            model: coefficient_noise(model, magnitude, &mut rng),
            deadline: full,
        },
        PerturbationKind::SpoofedInput => Perturbed {
            model: spoofed_input(model, magnitude, &mut rng),
            deadline: full,
        },
        PerturbationKind::TimingFault => Perturbed {
            model: model.clone(),
            deadline: full.scaled(1.0 - magnitude),
        },
    }
}
