//! Repository acquisition: clone the submission and pin the revision.

use crate::command::{CommandRunner, CommandSpec};
use crate::context::JobContext;
use autograde_core::{GradeError, GradingJob, Result};
use std::path::Path;
use tracing::info;

/// Fetches a submission into a local working tree.
pub struct RepositoryAcquirer<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> RepositoryAcquirer<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Clone `job.repo_url` into `dest` and check out the requested revision.
    ///
    /// `dest` must not exist yet. Returns the checked-out commit when git
    /// reports one.
    pub async fn acquire(
        &self,
        job: &GradingJob,
        dest: &Path,
        ctx: &mut JobContext,
    ) -> Result<Option<String>> {
        let dest_arg = dest.to_string_lossy().to_string();
        let clone = git(&["clone", job.repo_url.as_str(), dest_arg.as_str()], ctx);
        ctx.log().info(format!("Cloning {}", job.repo_url));

        let output = self
            .runner
            .run(&clone)
            .await
            .map_err(|source| GradeError::Spawn {
                program: "git".to_string(),
                source,
            })?;
        if output.timed_out() {
            return Err(GradeError::AcquisitionTimeout {
                timeout_secs: clone.timeout.as_secs(),
            });
        }
        if !output.success() {
            let detail = failure_detail(&output.stderr, &output.describe(clone.timeout));
            return Err(GradeError::CloneFailed(detail));
        }

        if let Some(revision) = job.target_revision() {
            self.checkout(revision, dest, ctx).await?;
        }

        let head = git(&["rev-parse", "HEAD"], ctx).current_dir(dest);
        let commit = match self.runner.run(&head).await {
            Ok(output) if output.success() => Some(output.stdout.trim().to_string()),
            _ => None,
        }
        .filter(|sha| !sha.is_empty());

        match &commit {
            Some(sha) => ctx.log().info(format!("Repository ready at commit {sha}")),
            None => ctx.log().warning("Could not determine the checked-out commit"),
        }
        info!(repo = %job.repo_url, commit = ?commit, "Repository acquired");
        Ok(commit)
    }

    async fn checkout(&self, revision: &str, dest: &Path, ctx: &mut JobContext) -> Result<()> {
        ctx.log().info(format!("Checking out {revision}"));
        let spec = git(&["checkout", "--quiet", revision], ctx).current_dir(dest);

        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|source| GradeError::Spawn {
                program: "git".to_string(),
                source,
            })?;
        if output.timed_out() {
            return Err(GradeError::AcquisitionTimeout {
                timeout_secs: spec.timeout.as_secs(),
            });
        }
        if !output.success() {
            return Err(GradeError::RevisionNotFound {
                revision: revision.to_string(),
                detail: failure_detail(&output.stderr, &output.describe(spec.timeout)),
            });
        }
        Ok(())
    }
}

/// A git invocation bounded by the remaining job budget. Prompts are
/// disabled so a private repository fails instead of waiting for input.
fn git(args: &[&str], ctx: &JobContext) -> CommandSpec {
    CommandSpec::new("git", args.iter().copied(), ctx.remaining())
        .env("GIT_TERMINAL_PROMPT", "0")
}

fn failure_detail(stderr: &str, fallback: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
