//! Result-building context threaded through every pipeline stage.

use autograde_core::{
    exit_code, numeric_job_id, CompilationRecord, ExecutionLog, GradeError, GradingJob,
    JobResult, JobResultParts, JobState, Result, TestCaseResult, ToolchainVariant,
    DEFAULT_TIMEOUT_SECS,
};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::info;

/// Mutable state of one grading job.
///
/// Stages receive `&mut JobContext` and append to it; the context is consumed
/// by [`JobContext::finish`], which is the only way to obtain a [`JobResult`].
#[derive(Debug)]
pub struct JobContext {
    raw_job_id: String,
    started_at: DateTime<Utc>,
    deadline: Option<Instant>,
    state: JobState,
    variant: Option<ToolchainVariant>,
    compilation: Option<CompilationRecord>,
    test_results: Vec<TestCaseResult>,
    log: ExecutionLog,
}

impl JobContext {
    pub fn new(raw_job_id: impl Into<String>) -> Self {
        Self {
            raw_job_id: raw_job_id.into(),
            started_at: Utc::now(),
            deadline: None,
            state: JobState::Init,
            variant: None,
            compilation: None,
            test_results: Vec::new(),
            log: ExecutionLog::new(),
        }
    }

    /// Arm the job deadline once the job has been validated.
    pub fn begin(&mut self, job: &GradingJob) {
        self.deadline = Some(Instant::now() + job.timeout);
        self.log.info(format!(
            "Starting job {} for {} (revision: {}, timeout: {}s)",
            job.job_id,
            job.repo_url,
            job.target_revision().unwrap_or("latest"),
            job.timeout.as_secs()
        ));
    }

    /// Time left before the job deadline.
    pub fn remaining(&self) -> Duration {
        match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move to the next lifecycle state.
    pub fn advance(&mut self, next: JobState) -> Result<()> {
        self.state = self.state.transition(next)?;
        info!(state = %self.state, "Job state changed");
        Ok(())
    }

    pub fn variant(&self) -> Option<ToolchainVariant> {
        self.variant
    }

    pub fn set_variant(&mut self, variant: ToolchainVariant) {
        self.variant = Some(variant);
    }

    pub fn compilation(&self) -> Option<&CompilationRecord> {
        self.compilation.as_ref()
    }

    pub fn set_compilation(&mut self, record: CompilationRecord) {
        self.compilation = Some(record);
    }

    /// Record one test outcome. Only legal once the build has succeeded.
    pub fn push_test(&mut self, result: TestCaseResult) -> Result<()> {
        if self.state != JobState::Built {
            return Err(GradeError::Internal(format!(
                "test result recorded in state {}",
                self.state
            )));
        }
        let verdict = if result.passed { "PASSED" } else { "FAILED" };
        self.log.test(format!("{}: {verdict}", result.test_name));
        self.test_results.push(result);
        Ok(())
    }

    pub fn test_results(&self) -> &[TestCaseResult] {
        &self.test_results
    }

    pub fn log(&mut self) -> &mut ExecutionLog {
        &mut self.log
    }

    pub fn execution_log(&self) -> &ExecutionLog {
        &self.log
    }

    /// Consume the context and build the terminal result.
    ///
    /// `outcome` is what the pipeline ended with: `Ok` for a completed run or
    /// the job-level error that stopped it.
    pub fn finish(mut self, outcome: Result<()>) -> JobResult {
        let job_id = match numeric_job_id(&self.raw_job_id) {
            Some(id) => id,
            None => {
                if !self.raw_job_id.trim().is_empty() {
                    self.log.warning(format!(
                        "Job id '{}' is not numeric; reporting 0",
                        self.raw_job_id
                    ));
                }
                0
            }
        };

        // A pipeline that returns Ok without reaching TESTED is reported as failed.
        let outcome = outcome.and_then(|()| self.state.transition(JobState::Emitted).map(drop));

        let (exit_code, error_message) = match outcome {
            Ok(()) => {
                self.state = JobState::Emitted;
                self.log.info(format!(
                    "Job completed: {} test result(s)",
                    self.test_results.len()
                ));
                (exit_code::SUCCESS, None)
            }
            Err(err) => {
                let reached = self.state;
                self.state = JobState::Failed;
                self.log.error(format!("Job failed after {reached}: {err}"));
                (err.exit_code(), Some(err.to_string()))
            }
        };

        let result = JobResult::from_parts(JobResultParts {
            job_id,
            started_at: self.started_at,
            test_results: self.test_results,
            compilation_output: self.compilation.map(|c| c.transcript).unwrap_or_default(),
            error_message,
            exit_code,
            logs: self.log.into_entries(),
        });

        for line in result.summary().lines() {
            info!("{line}");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autograde_core::{JobConfig, JobStatus, LogKind};

    fn job(timeout_secs: &str) -> GradingJob {
        JobConfig {
            job_id: Some("9".to_string()),
            repo_url: Some("repo".to_string()),
            revision: None,
            timeout_secs: Some(timeout_secs.to_string()),
        }
        .validate()
        .unwrap()
    }

    fn advance_to_built(ctx: &mut JobContext) {
        for state in [JobState::Acquired, JobState::Detected, JobState::Built] {
            ctx.advance(state).unwrap();
        }
    }

    #[test]
    fn test_success_finish() {
        let mut ctx = JobContext::new("9");
        ctx.begin(&job("60"));
        advance_to_built(&mut ctx);
        ctx.set_compilation(CompilationRecord::new(true, "ok"));
        ctx.push_test(TestCaseResult::passed("testAdd", "")).unwrap();
        ctx.advance(JobState::Tested).unwrap();

        let result = ctx.finish(Ok(()));
        assert_eq!(result.job_id, 9);
        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.error_message, None);
        assert_eq!(result.compilation_output, "ok");
        assert_eq!(result.test_results.len(), 1);
        assert!(result.logs.iter().any(|e| e.kind == LogKind::Test));
    }

    #[test]
    fn test_failure_finish() {
        let mut ctx = JobContext::new("9");
        ctx.advance(JobState::Acquired).unwrap();
        let result = ctx.finish(Err(GradeError::UnsupportedToolchain));

        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.exit_code, 1);
        assert!(result.error_message.unwrap().contains("unsupported toolchain"));
        assert!(result.test_results.is_empty());
        let last = result.logs.last().unwrap();
        assert_eq!(last.kind, LogKind::Error);
        assert!(last.message.contains("ACQUIRED"));
    }

    #[test]
    fn test_ok_before_tested_is_reported_as_failure() {
        let mut ctx = JobContext::new("3");
        ctx.advance(JobState::Acquired).unwrap();
        let result = ctx.finish(Ok(()));
        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.exit_code, 1);
        assert!(result.error_message.unwrap().contains("ACQUIRED -> EMITTED"));
    }

    #[test]
    fn test_push_test_requires_built_state() {
        let mut ctx = JobContext::new("1");
        let err = ctx.push_test(TestCaseResult::passed("t", "")).unwrap_err();
        assert!(matches!(err, GradeError::Internal(_)));
        assert!(ctx.test_results().is_empty());
    }

    #[test]
    fn test_non_numeric_job_id_reported_as_zero() {
        let ctx = JobContext::new("job-abc");
        let result = ctx.finish(Err(GradeError::Config("missing".to_string())));
        assert_eq!(result.job_id, 0);
        assert!(result
            .logs
            .iter()
            .any(|e| e.kind == LogKind::Warning && e.message.contains("job-abc")));
    }

    #[test]
    fn test_remaining_budget() {
        let mut ctx = JobContext::new("1");
        assert_eq!(ctx.remaining(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        ctx.begin(&job("60"));
        let remaining = ctx.remaining();
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(55));
    }
}
