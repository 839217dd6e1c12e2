//! Domain models for autograde.
//!
//! Canonical definitions for the core entities:
//! - `GradingJob`: Immutable job input
//! - `ToolchainVariant`: Build toolchain classification
//! - `JobResult`: The single result document emitted per job
//! - `ExecutionLog`: Append-only narration carried in the result
//! - `JobState`: Lifecycle state machine

pub mod error;
pub mod job;
pub mod log;
pub mod result;
pub mod state;
pub mod toolchain;

// Re-export main types and errors
pub use error::{GradeError, Result};
pub use job::{numeric_job_id, GradingJob, JobConfig, DEFAULT_TIMEOUT_SECS};
pub use log::{ExecutionLog, ExecutionLogEntry, LogKind};
pub use result::{
    exit_code, CompilationRecord, JobResult, JobResultParts, JobStatus, TestCaseResult,
};
pub use state::JobState;
pub use toolchain::ToolchainVariant;
