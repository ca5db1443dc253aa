//! Hand-off of finished evidence records to an anchoring service.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::info;

use crate::domain::error::{KernelError, Result};
use crate::evidence::record::EvidenceRecord;

/// Destination for evidence records. The kernel never publishes on its own.
#[async_trait]
pub trait EvidenceSink: Send + Sync {
    async fn publish(&self, record: &EvidenceRecord) -> Result<()>;
}

/// Keeps published records in memory.
#[derive(Debug, Default)]
pub struct MemoryEvidenceSink {
    records: Mutex<Vec<EvidenceRecord>>,
}

impl MemoryEvidenceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EvidenceRecord> {
        self.records
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EvidenceSink for MemoryEvidenceSink {
    async fn publish(&self, record: &EvidenceRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| KernelError::Sink("memory sink lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }
}

/// Writes each record as pretty JSON to `<dir>/<problem_id>-<invocation>.json`.
#[derive(Debug, Clone)]
pub struct FsEvidenceSink {
    dir: PathBuf,
}

impl FsEvidenceSink {
    /// Create the sink, creating `dir` if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, record: &EvidenceRecord) -> PathBuf {
        self.dir.join(format!("{}.json", record.file_stem()))
    }

    /// Read a record back from disk.
    pub fn read(path: impl AsRef<Path>) -> Result<EvidenceRecord> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl EvidenceSink for FsEvidenceSink {
    async fn publish(&self, record: &EvidenceRecord) -> Result<()> {
        let path = self.path_for(record);
        let dir = self.dir.clone();
        let json = serde_json::to_vec_pretty(record)?;

        let written = path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            // Atomic write: temp file in the target directory, then rename.
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(&json)?;
            tmp.persist(&path).map_err(|e| KernelError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| KernelError::Sink(format!("evidence writer aborted: {e}")))??;

        info!(event = "evidence.published", path = %written.display());
        Ok(())
    }
}
