//! Canonical result document and its parts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::log::ExecutionLogEntry;

/// Process exit codes of the result document.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERIC_FAILURE: i32 = 1;
    pub const COMPILATION_FAILURE: i32 = 2;
    pub const INTERRUPTED: i32 = 130;
}

/// Outcome of the compile stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompilationRecord {
    pub success: bool,
    pub transcript: String,
}

impl CompilationRecord {
    pub fn new(success: bool, transcript: impl Into<String>) -> Self {
        Self {
            success,
            transcript: transcript.into(),
        }
    }
}

/// Outcome of a single test case or executable unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    /// Unique within the run, not globally.
    pub test_name: String,

    pub passed: bool,

    /// Captured output of the test.
    pub output: String,

    /// Failure detail; always present for failed structured results.
    pub error_output: Option<String>,

    /// `None` when the toolchain does not report timing.
    pub duration_ms: Option<u64>,
}

impl TestCaseResult {
    pub fn passed(test_name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            passed: true,
            output: output.into(),
            error_output: None,
            duration_ms: None,
        }
    }

    pub fn failed(
        test_name: impl Into<String>,
        output: impl Into<String>,
        error_output: impl Into<String>,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            passed: false,
            output: output.into(),
            error_output: Some(error_output.into()),
            duration_ms: None,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: Option<u64>) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Terminal status of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Completed,
    Failed,
}

/// The single result document emitted per job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub job_id: i64,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub test_results: Vec<TestCaseResult>,
    pub compilation_output: String,
    /// Set only for job-level failures.
    pub error_message: Option<String>,
    pub exit_code: i32,
    pub logs: Vec<ExecutionLogEntry>,
}

/// Parts of a [`JobResult`] gathered at termination time.
#[derive(Debug, Clone)]
pub struct JobResultParts {
    pub job_id: i64,
    pub started_at: DateTime<Utc>,
    pub test_results: Vec<TestCaseResult>,
    pub compilation_output: String,
    pub error_message: Option<String>,
    pub exit_code: i32,
    pub logs: Vec<ExecutionLogEntry>,
}

impl JobResult {
    /// Assemble the document. Status is derived from the exit code so the
    /// two can never disagree.
    pub fn from_parts(parts: JobResultParts) -> Self {
        let status = if parts.exit_code == exit_code::SUCCESS {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };

        Self {
            job_id: parts.job_id,
            status,
            started_at: parts.started_at,
            completed_at: Utc::now(),
            test_results: parts.test_results,
            compilation_output: parts.compilation_output,
            error_message: parts.error_message,
            exit_code: parts.exit_code,
            logs: parts.logs,
        }
    }

    pub fn passed_count(&self) -> usize {
        self.test_results.iter().filter(|t| t.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.test_results.iter().filter(|t| !t.passed).count()
    }

    /// Human-readable summary for the log channel.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Job {} {:?} (exit code {}): {} passed, {} failed, {} total\n",
            self.job_id,
            self.status,
            self.exit_code,
            self.passed_count(),
            self.failed_count(),
            self.test_results.len()
        );
        if let Some(err) = &self.error_message {
            out.push_str(&format!("Error: {err}\n"));
        }
        for test in &self.test_results {
            let verdict = if test.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!("  [{verdict}] {}", test.test_name));
            if let Some(ms) = test.duration_ms {
                out.push_str(&format!(" ({ms} ms)"));
            }
            if let Some(detail) = &test.error_output {
                out.push_str(&format!(": {}", detail.lines().next().unwrap_or_default()));
            }
            out.push('\n');
        }
        if !self.compilation_output.is_empty() {
            out.push_str("Compilation output:\n");
            out.push_str(&self.compilation_output);
            if !self.compilation_output.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}
