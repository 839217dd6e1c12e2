//! Job session: owns the working directory and guarantees exactly one result.

use crate::command::CommandRunner;
use crate::context::JobContext;
use crate::pipeline::GradingPipeline;
use crate::test_run::UNIT_TIMEOUT;
use autograde_core::{GradeError, JobConfig, JobResult, Result};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{info, warn};

/// Name of the clone inside the per-job working directory.
const SOURCE_DIR: &str = "source";

const WORKDIR_PREFIX: &str = "autograde-";

/// Host-side knobs that are not part of the job contract.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Parent for per-job working directories (system temp dir when `None`).
    pub workdir: Option<PathBuf>,

    /// Leave the working directory in place after the job.
    pub keep_workdir: bool,

    /// Deadline for each manifest-less unit.
    pub unit_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            workdir: None,
            keep_workdir: false,
            unit_timeout: UNIT_TIMEOUT,
        }
    }
}

/// Per-job scratch directory.
enum Workspace {
    /// Removed when the job ends.
    Temporary(TempDir),

    /// Left on disk for inspection.
    Kept(PathBuf),
}

impl Workspace {
    fn create(options: &SessionOptions) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKDIR_PREFIX);
        let dir = match &options.workdir {
            Some(base) => {
                std::fs::create_dir_all(base)?;
                builder.tempdir_in(base)?
            }
            None => builder.tempdir()?,
        };

        if options.keep_workdir {
            Ok(Workspace::Kept(dir.keep()))
        } else {
            Ok(Workspace::Temporary(dir))
        }
    }

    fn path(&self) -> &Path {
        match self {
            Workspace::Temporary(dir) => dir.path(),
            Workspace::Kept(path) => path,
        }
    }

    fn release(self, ctx: &mut JobContext) {
        match self {
            Workspace::Temporary(dir) => {
                let path = dir.path().to_path_buf();
                if let Err(e) = dir.close() {
                    ctx.log().warning(format!(
                        "Failed to remove working directory {}: {e}",
                        path.display()
                    ));
                }
            }
            Workspace::Kept(path) => ctx
                .log()
                .info(format!("Working directory kept at {}", path.display())),
        }
    }
}

/// Runs one job end to end and always yields a [`JobResult`].
///
/// Configuration errors, stage failures, panics inside the pipeline and a
/// shutdown request all end in the same place: [`JobContext::finish`].
pub struct GradingSession<R> {
    runner: R,
    options: SessionOptions,
}

impl<R: CommandRunner> GradingSession<R> {
    pub fn new(runner: R, options: SessionOptions) -> Self {
        Self { runner, options }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Grade `config`, stopping early when `shutdown` resolves.
    ///
    /// Child processes are killed when the pipeline future is dropped, and
    /// the working directory is released before the result is built.
    pub async fn run<F>(&self, config: &JobConfig, shutdown: F) -> JobResult
    where
        F: Future<Output = ()>,
    {
        let mut ctx = JobContext::new(config.job_id.clone().unwrap_or_default());
        let outcome = self.grade(config, &mut ctx, shutdown).await;
        ctx.finish(outcome)
    }

    async fn grade<F>(&self, config: &JobConfig, ctx: &mut JobContext, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let job = config.validate()?;
        ctx.begin(&job);

        let workspace = Workspace::create(&self.options)?;
        let dest = workspace.path().join(SOURCE_DIR);
        info!(workdir = %workspace.path().display(), "Working directory created");

        let pipeline =
            GradingPipeline::new(&self.runner).with_unit_timeout(self.options.unit_timeout);
        let graded = AssertUnwindSafe(pipeline.run(&job, &dest, ctx)).catch_unwind();

        let outcome = tokio::select! {
            result = graded => result.unwrap_or_else(|panic| {
                Err(GradeError::Internal(format!(
                    "grading panicked: {}",
                    panic_message(panic.as_ref())
                )))
            }),
            () = shutdown => {
                warn!(job_id = %job.job_id, "Shutdown requested; abandoning job");
                Err(GradeError::Interrupted)
            }
        };

        workspace.release(ctx);
        outcome
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
