//! Grading pipeline: acquire, detect, build, test.

use crate::acquire::RepositoryAcquirer;
use crate::build::BuildExecutor;
use crate::command::CommandRunner;
use crate::context::JobContext;
use crate::detect::ToolchainDetector;
use crate::test_run::{TestExecutor, UNIT_TIMEOUT};
use autograde_core::{GradingJob, JobState, Result};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Runs the stages of one job in order against a context.
///
/// The pipeline never builds a result itself; it advances the context and
/// returns the first job-level error, leaving emission to the caller.
pub struct GradingPipeline<'a> {
    runner: &'a dyn CommandRunner,
    unit_timeout: Duration,
}

impl<'a> GradingPipeline<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            unit_timeout: UNIT_TIMEOUT,
        }
    }

    pub fn with_unit_timeout(mut self, unit_timeout: Duration) -> Self {
        self.unit_timeout = unit_timeout;
        self
    }

    /// Grade `job` using `dest` (not yet existing) as the working tree.
    pub async fn run(&self, job: &GradingJob, dest: &Path, ctx: &mut JobContext) -> Result<()> {
        RepositoryAcquirer::new(self.runner)
            .acquire(job, dest, ctx)
            .await?;
        ctx.advance(JobState::Acquired)?;

        let variant = ToolchainDetector::detect(dest)?;
        ctx.set_variant(variant);
        ctx.log().info(format!("Detected toolchain: {variant}"));
        ctx.advance(JobState::Detected)?;

        BuildExecutor::new(self.runner)
            .build(variant, dest, ctx)
            .await?;
        ctx.advance(JobState::Built)?;

        let count = TestExecutor::new(self.runner)
            .with_unit_timeout(self.unit_timeout)
            .run(variant, dest, ctx)
            .await?;
        ctx.advance(JobState::Tested)?;

        info!(job_id = %job.job_id, %variant, results = count, "Grading pipeline finished");
        Ok(())
    }
}
