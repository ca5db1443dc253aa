//! Adversarial robustness probing.
//!
//! [`perturb`] builds perturbed model copies; [`sandbox`] re-solves them in
//! parallel and records how each result moved against the baseline.

pub mod perturb;
pub mod sandbox;

pub use sandbox::{
    run_trials, OutcomeFingerprint, PerturbationTrial, RobustnessDelta, TrialFingerprint,
    TrialOutcome,
};
