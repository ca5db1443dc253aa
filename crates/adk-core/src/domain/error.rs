//! Kernel error taxonomy.

/// Malformed problem models and run configurations.
///
/// Always fatal and always raised before any solver is invoked.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("problem identifier must be non-empty and contain no whitespace: {0:?}")]
    InvalidProblemId(String),

    #[error("{location} references undefined variable: {name}")]
    UndefinedVariable { location: String, name: String },

    #[error("variable {name} has inverted bounds: lower {lower} > upper {upper}")]
    InvertedBounds { name: String, lower: f64, upper: f64 },

    #[error("duplicate variable name: {0}")]
    DuplicateVariable(String),

    #[error("duplicate constraint name: {0}")]
    DuplicateConstraint(String),

    #[error("non-finite number in {location}")]
    NonFinite { location: String },

    #[error("name must not be empty ({0})")]
    EmptyName(String),
}

/// Solver failures on input that passed canonicalization.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverError {
    #[error("malformed solver input: {0}")]
    Malformed(String),

    #[error("solver deadline must not be negative (got {budget_ms}ms)")]
    DeadlineExceeded { budget_ms: i64 },

    #[error("solver internal failure: {0}")]
    Internal(String),
}

/// Errors surfaced by the decision kernel.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("hard deadline exceeded during {stage}: {elapsed_ms}ms elapsed, limit {limit_ms}ms")]
    DeadlineExceeded {
        stage: String,
        elapsed_ms: u64,
        limit_ms: u64,
    },

    #[error("invalid run configuration: {0}")]
    Config(String),

    #[error("illegal kernel transition: {from} on {event}")]
    IllegalTransition { from: String, event: String },

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("non-canonical value: {0}")]
    NonCanonical(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("manifest parse error: {0}")]
    Manifest(String),

    #[error("evidence sink error: {0}")]
    Sink(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;
