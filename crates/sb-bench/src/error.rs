//! Harness errors.

/// Errors surfaced by the benchmark harness.
///
/// Stack operations never fail; everything here comes from setting up a
/// run or from checking it afterwards.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown stack: {0}. Expected: lock-free, locked, deferred, all")]
    UnknownStack(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Verification failed for the {stack} stack:\n{failures}")]
    VerificationFailed { stack: String, failures: String },
}
