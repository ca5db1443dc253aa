//! Per-run configuration.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::{KernelError, Result};

/// Solver strategy selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    Exact,
    Heuristic,
    QuantumReady,
}

impl SolverKind {
    pub fn name(&self) -> &'static str {
        match self {
            SolverKind::Exact => "exact",
            SolverKind::Heuristic => "heuristic",
            SolverKind::QuantumReady => "quantum_ready",
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SolverKind {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "exact" | "milp" => Ok(SolverKind::Exact),
            "heuristic" => Ok(SolverKind::Heuristic),
            "quantum_ready" | "quantum-ready" | "quantum" => Ok(SolverKind::QuantumReady),
            other => Err(KernelError::Config(format!("unknown solver: {other}"))),
        }
    }
}

/// Class of adversarial perturbation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerturbationKind {
    /// Multiplicative noise on constraint and objective coefficients.
    CoefficientNoise,
    /// Constraint right-hand sides pushed outside their nominal values.
    SpoofedInput,
    /// Solver deadline shrunk for the trial.
    TimingFault,
}

impl PerturbationKind {
    pub fn name(&self) -> &'static str {
        match self {
            PerturbationKind::CoefficientNoise => "coefficient_noise",
            PerturbationKind::SpoofedInput => "spoofed_input",
            PerturbationKind::TimingFault => "timing_fault",
        }
    }
}

impl FromStr for PerturbationKind {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "coefficient_noise" | "noise_injection" | "noise" => {
                Ok(PerturbationKind::CoefficientNoise)
            }
            "spoofed_input" | "spoofing" => Ok(PerturbationKind::SpoofedInput),
            "timing_fault" | "timing" => Ok(PerturbationKind::TimingFault),
            other => Err(KernelError::Config(format!(
                "unknown perturbation test: {other}"
            ))),
        }
    }
}

/// One named perturbation trial to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbationSpec {
    pub name: String,
    pub kind: PerturbationKind,
    /// Bounded to `[0, 1]`.
    pub magnitude: f64,
}

impl PerturbationSpec {
    pub fn new(name: impl Into<String>, kind: PerturbationKind, magnitude: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            magnitude,
        }
    }

    /// Spec named after its kind.
    pub fn of_kind(kind: PerturbationKind, magnitude: f64) -> Self {
        Self::new(kind.name(), kind, magnitude)
    }
}

/// Adversarial probing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdversarialConfig {
    pub enabled: bool,
    #[serde(default)]
    pub perturbations: Vec<PerturbationSpec>,
    /// Upper bound on trials solved at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    4
}

impl Default for AdversarialConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            perturbations: Vec::new(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl AdversarialConfig {
    pub fn enabled(perturbations: Vec<PerturbationSpec>) -> Self {
        Self {
            enabled: true,
            perturbations,
            ..Self::default()
        }
    }
}

/// Latency targets a run is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SloTargets {
    pub p50_ms: u64,
    pub p99_ms: u64,
}

impl Default for SloTargets {
    fn default() -> Self {
        Self {
            p50_ms: 250,
            p99_ms: 1_000,
        }
    }
}

/// Everything the caller decides about one kernel invocation.
///
/// All fields are deterministic inputs and take part in the evidence hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub problem_id: String,
    pub solver: SolverKind,
    pub seed: u64,
    #[serde(default)]
    pub adversarial: AdversarialConfig,
    /// Solver wall-clock budget. Negative values are rejected by the solver.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: i64,
    /// When set, exceeding it at any stage boundary aborts the run.
    #[serde(default)]
    pub hard_deadline_ms: Option<u64>,
    #[serde(default)]
    pub slo: SloTargets,
    #[serde(default)]
    pub bridge_flow: Option<String>,
    #[serde(default)]
    pub safety_critical: bool,
    /// Solver to re-run with when the baseline times out or errors.
    #[serde(default)]
    pub escalation: Option<SolverKind>,
}

fn default_deadline_ms() -> i64 {
    5_000
}

impl RunConfig {
    pub fn new(problem_id: impl Into<String>, solver: SolverKind, seed: u64) -> Self {
        Self {
            problem_id: problem_id.into(),
            solver,
            seed,
            adversarial: AdversarialConfig::default(),
            deadline_ms: default_deadline_ms(),
            hard_deadline_ms: None,
            slo: SloTargets::default(),
            bridge_flow: None,
            safety_critical: false,
            escalation: None,
        }
    }

    pub fn with_adversarial(mut self, adversarial: AdversarialConfig) -> Self {
        self.adversarial = adversarial;
        self
    }

    pub fn with_deadline_ms(mut self, deadline_ms: i64) -> Self {
        self.deadline_ms = deadline_ms;
        self
    }

    pub fn with_hard_deadline_ms(mut self, hard_deadline_ms: u64) -> Self {
        self.hard_deadline_ms = Some(hard_deadline_ms);
        self
    }

    pub fn with_slo(mut self, slo: SloTargets) -> Self {
        self.slo = slo;
        self
    }

    pub fn with_bridge_flow(mut self, label: impl Into<String>) -> Self {
        self.bridge_flow = Some(label.into());
        self
    }

    pub fn with_escalation(mut self, solver: SolverKind) -> Self {
        self.escalation = Some(solver);
        self
    }

    pub fn safety_critical(mut self) -> Self {
        self.safety_critical = true;
        self
    }

    /// Hard deadline as a `Duration`, if configured.
    pub fn hard_deadline(&self) -> Option<Duration> {
        self.hard_deadline_ms.map(Duration::from_millis)
    }

    /// Reject configurations the kernel must not start with.
    pub fn validate(&self) -> Result<()> {
        if self.problem_id.trim().is_empty() {
            return Err(KernelError::Config("problem_id cannot be empty".to_string()));
        }
        if self.slo.p50_ms > self.slo.p99_ms {
            return Err(KernelError::Config(format!(
                "p50 target {}ms exceeds p99 target {}ms",
                self.slo.p50_ms, self.slo.p99_ms
            )));
        }
        if self.adversarial.max_concurrency == 0 {
            return Err(KernelError::Config(
                "adversarial max_concurrency must be at least 1".to_string(),
            ));
        }

        let mut names = BTreeSet::new();
        for spec in &self.adversarial.perturbations {
            if spec.name.trim().is_empty() {
                return Err(KernelError::Config(
                    "perturbation name cannot be empty".to_string(),
                ));
            }
            if !names.insert(spec.name.as_str()) {
                return Err(KernelError::Config(format!(
                    "duplicate perturbation name: {}",
                    spec.name
                )));
            }
            if !spec.magnitude.is_finite() || !(0.0..=1.0).contains(&spec.magnitude) {
                return Err(KernelError::Config(format!(
                    "perturbation {} magnitude {} outside [0, 1]",
                    spec.name, spec.magnitude
                )));
            }
        }

        if self.safety_critical && self.solver == SolverKind::QuantumReady {
            match self.escalation {
                Some(SolverKind::Exact) | Some(SolverKind::Heuristic) => {}
                _ => {
                    return Err(KernelError::Config(
                        "safety-critical runs on the quantum-ready solver need an exact or heuristic escalation"
                            .to_string(),
                    ))
                }
            }
        }

        Ok(())
    }
}
