//! Autograde Core Library
//!
//! Data model, error taxonomy and logging shared by the autograde engine
//! and its command-line front end.

pub mod domain;
pub mod telemetry;

pub use domain::{
    exit_code, numeric_job_id, CompilationRecord, ExecutionLog, ExecutionLogEntry, GradeError,
    GradingJob, JobConfig, JobResult, JobResultParts, JobState, JobStatus, LogKind, Result,
    TestCaseResult, ToolchainVariant, DEFAULT_TIMEOUT_SECS,
};

pub use telemetry::init_tracing;
