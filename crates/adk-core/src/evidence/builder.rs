//! Evidence assembly and verification.
//!
//! The hashed payload is fixed:
//!
//! ```text
//! { schema_version, model, config, result, trials }
//! ```
//!
//! `result` and `trials` enter through their fingerprints, so wall-clock
//! durations, timing deltas and timestamps never influence the hash.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::adversarial::{PerturbationTrial, TrialFingerprint};
use crate::canonical::CanonicalModel;
use crate::domain::config::{RunConfig, SolverKind};
use crate::domain::digest::{self, is_hex_digest};
use crate::domain::error::{KernelError, Result};
use crate::domain::result::{ResultFingerprint, SolverResult};
use crate::evidence::record::{EvidenceRecord, SloCompliance, SCHEMA_VERSION};

#[derive(Serialize)]
struct HashedPayload<'a> {
    schema_version: u32,
    model: &'a CanonicalModel,
    config: &'a RunConfig,
    result: ResultFingerprint<'a>,
    trials: Vec<TrialFingerprint<'a>>,
}

/// Everything a finished run contributes to its evidence record.
#[derive(Debug, Clone)]
pub struct EvidenceDraft<'a> {
    pub model: &'a CanonicalModel,
    pub config: &'a RunConfig,
    pub invocation: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Canonicalizing through assuring.
    pub duration_ms: u64,
    pub stages: Vec<String>,
    pub result: SolverResult,
    pub trials: Vec<PerturbationTrial>,
    pub escalated_from: Option<SolverKind>,
}

pub struct EvidenceBuilder;

impl EvidenceBuilder {
    /// Canonical hash over the fixed payload. Trials must already be sorted.
    pub fn hash(
        model: &CanonicalModel,
        config: &RunConfig,
        result: &SolverResult,
        trials: &[PerturbationTrial],
    ) -> Result<String> {
        let payload = HashedPayload {
            schema_version: SCHEMA_VERSION,
            model,
            config,
            result: result.fingerprint(),
            trials: trials.iter().map(PerturbationTrial::fingerprint).collect(),
        };
        digest::digest_of(&payload)
    }

    pub fn build(draft: EvidenceDraft<'_>) -> Result<EvidenceRecord> {
        let mut trials = draft.trials;
        trials.sort_by(|a, b| a.name.cmp(&b.name));

        let canonical_hash = Self::hash(draft.model, draft.config, &draft.result, &trials)?;
        let model_digest = draft.model.digest()?;
        let slo = SloCompliance::measure(draft.duration_ms, &draft.config.slo, draft.result.status);
        debug!(hash = %canonical_hash, trials = trials.len(), "evidence assembled");

        Ok(EvidenceRecord {
            schema_version: SCHEMA_VERSION,
            record_id: Uuid::new_v4().to_string(),
            problem_id: draft.config.problem_id.clone(),
            invocation: draft.invocation,
            started_at: draft.started_at,
            finished_at: draft.finished_at,
            bridge_flow: draft.config.bridge_flow.clone(),
            stages: draft.stages,
            deterministic: true,
            canonical_hash,
            model_digest,
            config: draft.config.clone(),
            result: draft.result,
            trials,
            slo,
            escalated_from: draft.escalated_from,
        })
    }

    /// Recompute both digests of `record` against `model`.
    pub fn verify(record: &EvidenceRecord, model: &CanonicalModel) -> Result<()> {
        if record.schema_version != SCHEMA_VERSION {
            return Err(KernelError::NonCanonical(format!(
                "unsupported schema version {}",
                record.schema_version
            )));
        }
        if !is_hex_digest(&record.canonical_hash) {
            return Err(KernelError::NonCanonical(format!(
                "canonical_hash is not a SHA-256 hex digest: {}",
                record.canonical_hash
            )));
        }

        let model_digest = model.digest()?;
        if model_digest != record.model_digest {
            return Err(KernelError::DigestMismatch {
                expected: record.model_digest.clone(),
                actual: model_digest,
            });
        }

        let actual = Self::hash(model, &record.config, &record.result, &record.trials)?;
        if actual != record.canonical_hash {
            return Err(KernelError::DigestMismatch {
                expected: record.canonical_hash.clone(),
                actual,
            });
        }
        Ok(())
    }
}
