//! Parallel perturbation trials.
//!
//! Each configured perturbation is solved on a blocking worker task; at most
//! `max_concurrency` trials run at once. Trial failures are recorded on the
//! trial and never abort the run.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tracing::{instrument, warn, Instrument};

use crate::adversarial::perturb;
use crate::canonical::CanonicalModel;
use crate::domain::config::{AdversarialConfig, PerturbationKind, SolverKind};
use crate::domain::result::{ResultFingerprint, SolverResult};
use crate::metrics::METRICS;
use crate::obs;
use crate::solver::solver_for;

/// How a perturbed result differs from the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessDelta {
    /// `perturbed - baseline`, when both carry an objective.
    pub objective_delta: Option<f64>,
    /// One side has a usable assignment and the other does not.
    pub feasibility_flipped: bool,
    pub status_changed: bool,
    /// Wall-clock difference. Excluded from evidence hashing.
    pub timing_delta_ms: i64,
}

impl RobustnessDelta {
    pub fn between(baseline: &SolverResult, perturbed: &SolverResult) -> Self {
        let objective_delta = match (baseline.objective, perturbed.objective) {
            (Some(b), Some(p)) => Some(p - b),
            _ => None,
        };
        let timing_delta_ms = i64::try_from(perturbed.metrics.duration_ms).unwrap_or(i64::MAX)
            - i64::try_from(baseline.metrics.duration_ms).unwrap_or(i64::MAX);
        Self {
            objective_delta,
            feasibility_flipped: baseline.status.has_solution() != perturbed.status.has_solution(),
            status_changed: baseline.status != perturbed.status,
            timing_delta_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrialOutcome {
    Completed {
        result: SolverResult,
        delta: RobustnessDelta,
    },
    Failed {
        error: String,
    },
}

/// One re-solve of a perturbed model copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbationTrial {
    pub name: String,
    pub kind: PerturbationKind,
    pub magnitude: f64,
    pub outcome: TrialOutcome,
}

impl PerturbationTrial {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, TrialOutcome::Failed { .. })
    }

    /// Hashable view without timing fields.
    pub fn fingerprint(&self) -> TrialFingerprint<'_> {
        let outcome = match &self.outcome {
            TrialOutcome::Completed { result, delta } => OutcomeFingerprint::Completed {
                result: result.fingerprint(),
                objective_delta: delta.objective_delta,
                feasibility_flipped: delta.feasibility_flipped,
                status_changed: delta.status_changed,
            },
            TrialOutcome::Failed { error } => OutcomeFingerprint::Failed { error },
        };
        TrialFingerprint {
            name: &self.name,
            kind: self.kind,
            magnitude: self.magnitude,
            outcome,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrialFingerprint<'a> {
    pub name: &'a str,
    pub kind: PerturbationKind,
    pub magnitude: f64,
    pub outcome: OutcomeFingerprint<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OutcomeFingerprint<'a> {
    Completed {
        result: ResultFingerprint<'a>,
        objective_delta: Option<f64>,
        feasibility_flipped: bool,
        status_changed: bool,
    },
    Failed {
        error: &'a str,
    },
}

/// Run every configured perturbation against a clone of `model`.
///
/// Each trial reuses `solver` and `seed` and gets a fresh `budget`. Returns
/// trials sorted by name; returns an empty vector without spawning anything
/// when adversarial mode is off or no perturbations are configured.
#[instrument(skip_all, fields(problem_id = %model.id(), solver = %solver))]
pub async fn run_trials(
    model: &CanonicalModel,
    baseline: &SolverResult,
    solver: SolverKind,
    config: &AdversarialConfig,
    seed: u64,
    budget: Duration,
) -> Vec<PerturbationTrial> {
    if !config.enabled || config.perturbations.is_empty() {
        return Vec::new();
    }

    let model = Arc::new(model.clone());
    let baseline = Arc::new(baseline.clone());
    let results: Arc<Mutex<Vec<PerturbationTrial>>> =
        Arc::new(Mutex::new(Vec::with_capacity(config.perturbations.len())));
    let sem = Arc::new(Semaphore::new(config.max_concurrency.max(1)));

    let mut tasks = Vec::with_capacity(config.perturbations.len());
    for spec in config.perturbations.iter().cloned() {
        let model = Arc::clone(&model);
        let baseline = Arc::clone(&baseline);
        let results = Arc::clone(&results);
        let sem = Arc::clone(&sem);

        let task = tokio::spawn(
            async move {
                let _permit = sem.acquire_owned().await.ok();

                let job_model = Arc::clone(&model);
                let job_spec = spec.clone();
                let job = tokio::task::spawn_blocking(move || {
                    let perturbed = perturb::apply(&job_model, &job_spec, seed, budget);
                    solver_for(solver).solve(&perturbed.model, seed, perturbed.deadline)
                });

                let outcome = match job.await {
                    Ok(Ok(result)) => {
                        let delta = RobustnessDelta::between(&baseline, &result);
                        TrialOutcome::Completed { result, delta }
                    }
                    Ok(Err(e)) => TrialOutcome::Failed {
                        error: e.to_string(),
                    },
                    Err(e) => TrialOutcome::Failed {
                        error: format!("trial worker aborted: {e}"),
                    },
                };

                let trial = PerturbationTrial {
                    name: spec.name,
                    kind: spec.kind,
                    magnitude: spec.magnitude,
                    outcome,
                };
                METRICS.inc_trials();
                if trial.is_failed() {
                    METRICS.inc_trial_failures();
                }
                obs::emit_trial_finished(model.id(), &trial);
                results.lock().await.push(trial);
            }
            .in_current_span(),
        );
        tasks.push(task);
    }

    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "perturbation task did not complete");
        }
    }

    let mut trials = std::mem::take(&mut *results.lock().await);
    trials.sort_by(|a, b| a.name.cmp(&b.name));
    trials
}
