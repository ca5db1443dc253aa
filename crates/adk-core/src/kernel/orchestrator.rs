//! Decision kernel orchestrator.
//!
//! Drives one invocation through the [`KernelState`] machine:
//! canonicalize, solve (with optional escalation), probe, then assemble
//! evidence. Stages run sequentially; only adversarial trials run in
//! parallel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, Instrument};

use crate::adversarial::run_trials;
use crate::canonical::{canonicalize, CanonicalModel};
use crate::domain::config::{RunConfig, SolverKind};
use crate::domain::error::{KernelError, Result, SolverError};
use crate::domain::model::ProblemModel;
use crate::domain::result::{SolverResult, SolverStatus};
use crate::evidence::{EvidenceBuilder, EvidenceDraft, EvidenceRecord};
use crate::kernel::state::{KernelEvent, KernelState};
use crate::metrics::METRICS;
use crate::obs;
use crate::solver::{solver_for, Deadline};

/// Result of a successful run, together with its evidence.
#[derive(Debug, Clone)]
pub struct KernelOutcome {
    pub result: SolverResult,
    pub evidence: EvidenceRecord,
}

/// Per-invocation bookkeeping: current state, stages entered, run clock.
struct RunTracker<'a> {
    problem_id: &'a str,
    hard_deadline: Option<Duration>,
    state: KernelState,
    stages: Vec<String>,
    clock: Instant,
}

impl<'a> RunTracker<'a> {
    fn new(problem_id: &'a str, hard_deadline: Option<Duration>) -> Self {
        Self {
            problem_id,
            hard_deadline,
            state: KernelState::Idle,
            stages: Vec::new(),
            clock: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.clock.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn check_hard_deadline(&self) -> Result<()> {
        if let Some(limit) = self.hard_deadline {
            if self.state != KernelState::Idle && self.clock.elapsed() >= limit {
                return Err(KernelError::DeadlineExceeded {
                    stage: self.state.to_string(),
                    elapsed_ms: self.elapsed_ms(),
                    limit_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                });
            }
        }
        Ok(())
    }

    fn advance(&mut self, event: KernelEvent) -> Result<()> {
        self.check_hard_deadline()?;
        let next = self.state.transition(event)?;
        if self.state == KernelState::Idle {
            self.clock = Instant::now();
        }
        self.state = next;
        if !next.is_terminal() {
            self.enter_stage(next.name());
        }
        Ok(())
    }

    /// Record a sub-stage that has no state of its own.
    fn enter_stage(&mut self, stage: &str) {
        self.stages.push(stage.to_string());
        obs::emit_stage_entered(self.problem_id, stage);
    }

    fn fail(&mut self) {
        if let Ok(next) = self.state.transition(KernelEvent::Fail) {
            self.state = next;
        }
    }
}

/// Entry point for solving problems with evidence.
///
/// Holds nothing but the invocation counter; runs are independent.
#[derive(Debug, Default)]
pub struct DecisionKernel {
    invocations: AtomicU64,
}

impl DecisionKernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invocations started so far.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Solve `model` under `config` and return the result with its evidence.
    ///
    /// Validation and solver errors are fatal and produce no evidence.
    /// Infeasibility, timeouts and SLO breaches are ordinary outcomes.
    pub async fn run(&self, config: &RunConfig, model: &ProblemModel) -> Result<KernelOutcome> {
        let invocation = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        let span = obs::run_span(&config.problem_id, invocation);
        self.run_invocation(config, model, invocation)
            .instrument(span)
            .await
    }

    async fn run_invocation(
        &self,
        config: &RunConfig,
        model: &ProblemModel,
        invocation: u64,
    ) -> Result<KernelOutcome> {
        let problem_id = config.problem_id.as_str();
        obs::emit_run_started(problem_id, invocation, config.solver);

        let mut tracker = RunTracker::new(problem_id, config.hard_deadline());
        match Self::drive(&mut tracker, config, model, invocation).await {
            Ok(outcome) => {
                METRICS.inc_runs();
                if outcome.evidence.slo.violated() {
                    METRICS.inc_slo_breaches();
                    obs::emit_slo_breached(problem_id, &outcome.evidence.slo);
                }
                obs::emit_run_finished(
                    problem_id,
                    invocation,
                    outcome.result.status,
                    outcome.evidence.slo.duration_ms,
                    &outcome.evidence.canonical_hash,
                );
                Ok(outcome)
            }
            Err(e) => {
                let stage = tracker.state.to_string();
                tracker.fail();
                METRICS.inc_failures();
                obs::emit_run_failed(problem_id, invocation, &stage, &e);
                Err(e)
            }
        }
    }

    async fn drive(
        tracker: &mut RunTracker<'_>,
        config: &RunConfig,
        model: &ProblemModel,
        invocation: u64,
    ) -> Result<KernelOutcome> {
        let started_at = Utc::now();

        // Canonicalizing
        tracker.advance(KernelEvent::Start)?;
        config.validate()?;
        if config.problem_id != model.id {
            return Err(KernelError::Config(format!(
                "run config targets {} but the model is {}",
                config.problem_id, model.id
            )));
        }
        let canonical = Arc::new(canonicalize(model)?);

        // Solving
        tracker.advance(KernelEvent::Canonicalized)?;
        let deadline = Deadline::from_millis(config.deadline_ms)?;
        let budget = deadline.budget();
        let mut result = solve_blocking(&canonical, config.solver, config.seed, deadline).await?;
        let mut solver = config.solver;
        let mut escalated_from = None;

        if let Some(escalation) = config.escalation {
            let stalled = matches!(result.status, SolverStatus::Timeout | SolverStatus::Error);
            if stalled && escalation != config.solver {
                tracker.check_hard_deadline()?;
                tracker.enter_stage("escalate");
                info!(from = %config.solver, to = %escalation, status = %result.status, "escalating solver");
                result =
                    solve_blocking(&canonical, escalation, config.seed, Deadline::new(budget)).await?;
                escalated_from = Some(config.solver);
                solver = escalation;
            }
        }

        // Perturbing
        let adversarial = config.adversarial.enabled;
        tracker.advance(KernelEvent::Solved { adversarial })?;
        let trials = if adversarial {
            let trials =
                run_trials(&canonical, &result, solver, &config.adversarial, config.seed, budget)
                    .await;
            tracker.advance(KernelEvent::TrialsFinished)?;
            trials
        } else {
            Vec::new()
        };

        // Assuring
        let evidence = EvidenceBuilder::build(EvidenceDraft {
            model: &canonical,
            config,
            invocation,
            started_at,
            finished_at: Utc::now(),
            duration_ms: tracker.elapsed_ms(),
            stages: tracker.stages.clone(),
            result,
            trials,
            escalated_from,
        })?;
        tracker.advance(KernelEvent::EvidenceBuilt)?;

        Ok(KernelOutcome {
            result: evidence.result.clone(),
            evidence,
        })
    }
}

/// Run a solver on the blocking pool and report it.
async fn solve_blocking(
    model: &Arc<CanonicalModel>,
    kind: SolverKind,
    seed: u64,
    deadline: Deadline,
) -> Result<SolverResult> {
    let job_model = Arc::clone(model);
    let result = tokio::task::spawn_blocking(move || solver_for(kind).solve(&job_model, seed, deadline))
        .await
        .map_err(|e| SolverError::Internal(format!("solver task aborted: {e}")))??;

    obs::emit_solver_finished(
        model.id(),
        kind,
        result.status,
        result.metrics.duration_ms,
        result.metrics.iterations,
    );
    Ok(result)
}
