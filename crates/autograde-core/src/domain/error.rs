//! Job-level error taxonomy for autograde.

use crate::domain::result::exit_code;
use crate::domain::state::JobState;

/// Errors that terminate a grading job.
///
/// Test-level failures never appear here: a failing test or unit is recorded
/// as a failed `TestCaseResult` and the pipeline carries on.
#[derive(Debug, thiserror::Error)]
pub enum GradeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("repository fetch timed out after {timeout_secs}s")]
    AcquisitionTimeout { timeout_secs: u64 },

    #[error("git clone failed: {0}")]
    CloneFailed(String),

    #[error("revision not found: {revision}: {detail}")]
    RevisionNotFound { revision: String, detail: String },

    #[error("unsupported toolchain: no build manifest or Java sources found")]
    UnsupportedToolchain,

    #[error("compilation failed: {reason}")]
    CompilationFailed { reason: String },

    #[error("no Java source files found to compile")]
    NoSourceFound,

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid job state transition: {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("job interrupted by termination signal")]
    Interrupted,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GradeError {
    /// Process exit code reported for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            GradeError::CompilationFailed { .. } | GradeError::NoSourceFound => {
                exit_code::COMPILATION_FAILURE
            }
            GradeError::Interrupted => exit_code::INTERRUPTED,
            _ => exit_code::GENERIC_FAILURE,
        }
    }
}

/// Result type for autograde operations.
pub type Result<T> = std::result::Result<T, GradeError>;
