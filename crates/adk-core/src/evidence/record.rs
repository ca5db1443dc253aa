//! The evidence record handed to the anchoring service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adversarial::PerturbationTrial;
use crate::domain::config::{RunConfig, SloTargets, SolverKind};
use crate::domain::result::{SolverResult, SolverStatus};

/// Version of the hashed payload layout.
pub const SCHEMA_VERSION: u32 = 1;

/// How one run measured against its latency targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SloCompliance {
    pub duration_ms: u64,
    pub p50_ms: u64,
    pub p99_ms: u64,
    pub p50_met: bool,
    pub p99_met: bool,
    /// False when the solver ran out of time.
    pub deadline_met: bool,
}

impl SloCompliance {
    pub fn measure(duration_ms: u64, targets: &SloTargets, status: SolverStatus) -> Self {
        Self {
            duration_ms,
            p50_ms: targets.p50_ms,
            p99_ms: targets.p99_ms,
            p50_met: duration_ms <= targets.p50_ms,
            p99_met: duration_ms <= targets.p99_ms,
            deadline_met: status != SolverStatus::Timeout,
        }
    }

    /// Any target missed.
    pub fn violated(&self) -> bool {
        !(self.p50_met && self.p99_met && self.deadline_met)
    }
}

/// Immutable audit artifact for one kernel invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub schema_version: u32,
    pub record_id: String,
    pub problem_id: String,
    pub invocation: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default)]
    pub bridge_flow: Option<String>,
    /// Kernel stages in the order they ran.
    pub stages: Vec<String>,
    pub deterministic: bool,
    /// SHA-256 over the canonical hashed payload.
    pub canonical_hash: String,
    /// SHA-256 over the canonical model alone.
    pub model_digest: String,
    pub config: RunConfig,
    pub result: SolverResult,
    /// Sorted by trial name.
    pub trials: Vec<PerturbationTrial>,
    pub slo: SloCompliance,
    /// Solver whose baseline result was replaced by the escalation solver.
    #[serde(default)]
    pub escalated_from: Option<SolverKind>,
}

impl EvidenceRecord {
    /// Name used when persisting this record.
    pub fn file_stem(&self) -> String {
        let safe: String = self
            .problem_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{safe}-{}", self.invocation)
    }
}
