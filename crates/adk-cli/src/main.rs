//! ADK - Auditable Decision Kernel CLI
//!
//! The `adk` command runs the decision kernel from a run manifest and checks
//! published evidence.
//!
//! ## Commands
//!
//! - `run`: solve the manifest's model and publish evidence
//! - `verify`: recompute an evidence record's hashes against its model
//! - `digest`: print the canonical digest of a model file

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use adk_core::manifest::read_model;
use adk_core::obs::RunSpan;
use adk_core::{
    canonicalize, DecisionKernel, EvidenceBuilder, EvidenceRecord, EvidenceSink, FsEvidenceSink,
    KernelOutcome, RunManifest, SolverStatus, METRICS,
};

#[derive(Parser)]
#[command(name = "adk")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Auditable decision kernel", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the model named by a run manifest and publish its evidence
    Run {
        /// Path to the run manifest (.json or .toml)
        manifest: PathBuf,

        /// Extra evidence directory, on top of the manifest's evidence_outputs
        #[arg(long)]
        evidence_dir: Option<PathBuf>,

        /// Print the full evidence record instead of a summary
        #[arg(long)]
        print_evidence: bool,
    },

    /// Verify an evidence record against the model its manifest names
    Verify {
        /// Path to the evidence record (JSON)
        evidence: PathBuf,

        /// Run manifest the record was produced from
        #[arg(long)]
        manifest: PathBuf,
    },

    /// Print the canonical digest of a model file
    Digest {
        /// Path to the model (.json or .toml)
        model: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    adk_core::init_tracing(cli.json, level);

    let outcome = match cli.command {
        Commands::Run {
            manifest,
            evidence_dir,
            print_evidence,
        } => cmd_run(&manifest, evidence_dir.as_deref(), print_evidence).await,
        Commands::Verify { evidence, manifest } => cmd_verify(&evidence, &manifest),
        Commands::Digest { model } => cmd_digest(&model),
    };
    METRICS.flush();
    outcome
}

/// One-line summary printed by `adk run`.
#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    problem_id: &'a str,
    invocation: u64,
    status: SolverStatus,
    objective: Option<f64>,
    canonical_hash: &'a str,
    duration_ms: u64,
    slo_violated: bool,
    trials: usize,
    evidence: Vec<PathBuf>,
}

async fn execute_manifest(
    manifest_path: &Path,
    extra_dir: Option<&Path>,
) -> Result<(KernelOutcome, Vec<PathBuf>)> {
    let manifest = RunManifest::load(manifest_path)
        .with_context(|| format!("Failed to load manifest {}", manifest_path.display()))?;
    let config = manifest
        .to_run_config()
        .context("Manifest does not describe a valid run")?;
    let model = manifest.load_model().context("Failed to load model")?;

    let kernel = DecisionKernel::new();
    let outcome = kernel
        .run(&config, &model)
        .await
        .with_context(|| format!("Kernel run failed for {}", config.problem_id))?;

    let mut dirs = manifest.evidence_dirs();
    if let Some(dir) = extra_dir {
        dirs.push(dir.to_path_buf());
    }
    let mut written = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let sink = FsEvidenceSink::new(&dir)
            .with_context(|| format!("Failed to open evidence directory {}", dir.display()))?;
        sink.publish(&outcome.evidence)
            .await
            .with_context(|| format!("Failed to publish evidence to {}", dir.display()))?;
        written.push(sink.path_for(&outcome.evidence));
    }
    Ok((outcome, written))
}

async fn cmd_run(manifest_path: &Path, extra_dir: Option<&Path>, print_evidence: bool) -> Result<()> {
    let (outcome, written) = execute_manifest(manifest_path, extra_dir).await?;
    let evidence = &outcome.evidence;

    if print_evidence {
        println!("{}", serde_json::to_string_pretty(evidence)?);
    } else {
        let summary = RunSummary {
            problem_id: &evidence.problem_id,
            invocation: evidence.invocation,
            status: outcome.result.status,
            objective: outcome.result.objective,
            canonical_hash: &evidence.canonical_hash,
            duration_ms: evidence.slo.duration_ms,
            slo_violated: evidence.slo.violated(),
            trials: evidence.trials.len(),
            evidence: written,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

fn read_evidence(path: &Path) -> Result<EvidenceRecord> {
    FsEvidenceSink::read(path).with_context(|| format!("Failed to read evidence {}", path.display()))
}

fn cmd_verify(evidence_path: &Path, manifest_path: &Path) -> Result<()> {
    let record = read_evidence(evidence_path)?;
    let _span = RunSpan::enter(&record.problem_id, record.invocation);

    let manifest = RunManifest::load(manifest_path)
        .with_context(|| format!("Failed to load manifest {}", manifest_path.display()))?;
    if manifest.problem_id != record.problem_id {
        bail!(
            "Evidence is for {} but the manifest names {}",
            record.problem_id,
            manifest.problem_id
        );
    }
    let model = manifest.load_model().context("Failed to load model")?;
    let canonical = canonicalize(&model).context("Model failed validation")?;

    EvidenceBuilder::verify(&record, &canonical).context("Evidence verification failed")?;
    info!(event = "evidence.verified", hash = %record.canonical_hash);
    println!("verified {} ({})", record.canonical_hash, record.problem_id);
    Ok(())
}

fn cmd_digest(model_path: &Path) -> Result<()> {
    let model = read_model(model_path)
        .with_context(|| format!("Failed to read model {}", model_path.display()))?;
    let digest = canonicalize(&model)
        .context("Model failed validation")?
        .digest()
        .context("Failed to digest model")?;
    println!("{digest}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model_json() -> serde_json::Value {
        json!({
            "id": "ops.thermal/2025-01-15",
            "kind": "general_milp",
            "variables": [
                {"name": "x", "var_type": "continuous", "lower": 0.0, "upper": 3.0},
                {"name": "y", "var_type": "continuous", "lower": 0.0, "upper": 10.0}
            ],
            "constraints": [{
                "name": "cap",
                "expr": {"terms": [{"var": "x", "coef": 1.0}, {"var": "y", "coef": 1.0}]},
                "relation": "<=",
                "rhs": 4.0
            }],
            "objective": {
                "sense": "maximize",
                "expr": {"terms": [{"var": "x", "coef": 3.0}, {"var": "y", "coef": 2.0}]}
            }
        })
    }

    fn write_fixture(dir: &Path) -> PathBuf {
        std::fs::write(
            dir.join("model.json"),
            serde_json::to_vec_pretty(&model_json()).expect("model json"),
        )
        .expect("write model");
        let manifest = r#"
problem_id = "ops.thermal/2025-01-15"
model_source = "model.json"
model_kind = "general_milp"
solver = "exact"
seed = 42
evidence_outputs = ["evidence"]

[adversarial]
enabled = true
tests = ["noise_injection", "spoofed_input"]
magnitude = 0.1
"#;
        let path = dir.join("run.toml");
        std::fs::write(&path, manifest).expect("write manifest");
        path
    }

    #[tokio::test]
    async fn test_run_publishes_verifiable_evidence() {
        let temp_dir = tempfile::tempdir().expect("tempdir");
        let manifest = write_fixture(temp_dir.path());

        let (outcome, written) = execute_manifest(&manifest, None).await.expect("run");
        assert_eq!(outcome.result.status, SolverStatus::Optimal);
        assert_eq!(outcome.result.objective, Some(11.0));
        assert_eq!(written.len(), 1);
        assert!(written[0].starts_with(temp_dir.path().join("evidence")));

        cmd_verify(&written[0], &manifest).expect("verify");
    }

    #[tokio::test]
    async fn test_verify_rejects_tampered_evidence() {
        let temp_dir = tempfile::tempdir().expect("tempdir");
        let manifest = write_fixture(temp_dir.path());
        let (_, written) = execute_manifest(&manifest, None).await.expect("run");

        let mut record = read_evidence(&written[0]).expect("read");
        record.result.assignment.insert("x".to_string(), 0.0);
        std::fs::write(&written[0], serde_json::to_vec(&record).expect("json")).expect("rewrite");

        let err = cmd_verify(&written[0], &manifest).expect_err("tampered");
        assert!(format!("{err:#}").contains("digest mismatch"));
    }

    #[test]
    fn test_missing_manifest_reports_path() {
        let temp_dir = tempfile::tempdir().expect("tempdir");
        let missing = temp_dir.path().join("absent.toml");
        let err = cmd_verify(&missing, &missing).expect_err("missing");
        assert!(format!("{err:#}").contains("absent.toml"));
    }

    #[test]
    fn test_digest_accepts_model_file() {
        let temp_dir = tempfile::tempdir().expect("tempdir");
        write_fixture(temp_dir.path());
        cmd_digest(&temp_dir.path().join("model.json")).expect("digest");
        assert!(cmd_digest(&temp_dir.path().join("model.yaml")).is_err());
    }
}
