//! Run manifests.
//!
//! A manifest is the on-disk description of one kernel invocation: which
//! model file to solve, with which solver and seed, which adversarial tests
//! to run and where evidence goes. JSON and TOML are accepted, chosen by file
//! extension. The kernel itself never reads files; callers load a manifest,
//! turn it into a [`RunConfig`] and hand the loaded model to the kernel.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::config::{
    AdversarialConfig, PerturbationKind, PerturbationSpec, RunConfig, SloTargets, SolverKind,
};
use crate::domain::error::{KernelError, Result};
use crate::domain::model::{ModelKind, ProblemModel};

fn default_magnitude() -> f64 {
    0.1
}

fn default_max_concurrency() -> usize {
    AdversarialConfig::default().max_concurrency
}

/// Adversarial section of a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestAdversarial {
    #[serde(default)]
    pub enabled: bool,
    /// Test names; each maps to a perturbation kind.
    #[serde(default)]
    pub tests: Vec<String>,
    /// Magnitude applied to every test.
    #[serde(default = "default_magnitude")]
    pub magnitude: f64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for ManifestAdversarial {
    fn default() -> Self {
        Self {
            enabled: false,
            tests: Vec::new(),
            magnitude: default_magnitude(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub problem_id: String,
    #[serde(default)]
    pub bridge_flow: Option<String>,
    /// Model file, relative to the manifest's directory.
    pub model_source: PathBuf,
    #[serde(default)]
    pub model_kind: Option<String>,
    pub solver: String,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub adversarial: ManifestAdversarial,
    /// Directories evidence records are published to.
    #[serde(default)]
    pub evidence_outputs: Vec<PathBuf>,
    #[serde(default)]
    pub deadline_ms: Option<i64>,
    #[serde(default)]
    pub hard_deadline_ms: Option<u64>,
    #[serde(default)]
    pub slo: Option<SloTargets>,
    #[serde(default)]
    pub safety_critical: bool,
    #[serde(default)]
    pub escalation: Option<String>,

    #[serde(skip)]
    base_dir: PathBuf,
}

/// Parse `text` as JSON or TOML depending on `path`'s extension.
fn parse_by_extension<T: DeserializeOwned>(path: &Path, text: &str) -> Result<T> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(text)
            .map_err(|e| KernelError::Manifest(format!("{}: {e}", path.display()))),
        Some("toml") => toml::from_str(text)
            .map_err(|e| KernelError::Manifest(format!("{}: {e}", path.display()))),
        _ => Err(KernelError::Manifest(format!(
            "{}: expected a .json or .toml file",
            path.display()
        ))),
    }
}

/// Read a problem model from a `.json` or `.toml` file.
pub fn read_model(path: impl AsRef<Path>) -> Result<ProblemModel> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        KernelError::Manifest(format!("cannot read model {}: {e}", path.display()))
    })?;
    parse_by_extension(path, &text)
}

impl RunManifest {
    /// Read and parse a manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut manifest: RunManifest = parse_by_extension(path, &text)?;
        manifest.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        debug!(path = %path.display(), problem_id = %manifest.problem_id, "manifest loaded");
        Ok(manifest)
    }

    /// Resolve relative paths against `dir` instead of the manifest's location.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn model_path(&self) -> PathBuf {
        self.base_dir.join(&self.model_source)
    }

    /// Evidence directories, resolved like the model path.
    pub fn evidence_dirs(&self) -> Vec<PathBuf> {
        self.evidence_outputs
            .iter()
            .map(|dir| self.base_dir.join(dir))
            .collect()
    }

    /// Build and validate the run configuration this manifest describes.
    pub fn to_run_config(&self) -> Result<RunConfig> {
        let solver: SolverKind = self.solver.parse()?;
        let mut config = RunConfig::new(&self.problem_id, solver, self.seed);

        let mut perturbations = Vec::with_capacity(self.adversarial.tests.len());
        for test in &self.adversarial.tests {
            let kind: PerturbationKind = test.parse()?;
            perturbations.push(PerturbationSpec::new(test, kind, self.adversarial.magnitude));
        }
        config.adversarial = AdversarialConfig {
            enabled: self.adversarial.enabled,
            perturbations,
            max_concurrency: self.adversarial.max_concurrency,
        };

        if let Some(deadline_ms) = self.deadline_ms {
            config.deadline_ms = deadline_ms;
        }
        config.hard_deadline_ms = self.hard_deadline_ms;
        if let Some(slo) = self.slo {
            config.slo = slo;
        }
        config.bridge_flow = self.bridge_flow.clone();
        config.safety_critical = self.safety_critical;
        config.escalation = self
            .escalation
            .as_deref()
            .map(str::parse::<SolverKind>)
            .transpose()?;

        config.validate()?;
        Ok(config)
    }

    /// Read the referenced model and check it is the one this manifest names.
    pub fn load_model(&self) -> Result<ProblemModel> {
        let path = self.model_path();
        let model = read_model(&path)?;

        if model.id != self.problem_id {
            return Err(KernelError::Manifest(format!(
                "model {} has id {}, manifest expects {}",
                path.display(),
                model.id,
                self.problem_id
            )));
        }
        if let Some(tag) = &self.model_kind {
            let expected = ModelKind::from_tag(tag);
            if model.kind != expected {
                return Err(KernelError::Manifest(format!(
                    "model {} is {}, manifest expects {}",
                    path.display(),
                    model.kind,
                    expected
                )));
            }
        }
        Ok(model)
    }
}
