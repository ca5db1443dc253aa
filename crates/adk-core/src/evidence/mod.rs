//! Tamper-evident evidence records.

pub mod builder;
pub mod record;
pub mod sink;

pub use builder::{EvidenceBuilder, EvidenceDraft};
pub use record::{EvidenceRecord, SloCompliance, SCHEMA_VERSION};
pub use sink::{EvidenceSink, FsEvidenceSink, MemoryEvidenceSink};
