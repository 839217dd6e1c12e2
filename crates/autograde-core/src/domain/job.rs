//! Grading job input contract.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::error::{GradeError, Result};

/// Overall job timeout when none is supplied.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Revision markers that mean "whatever the default branch points at".
const DEFAULT_REVISION_MARKERS: [&str; 2] = ["HEAD", "latest"];

/// Raw job input as handed over by the configuration collaborator.
///
/// Every field is optional here; [`JobConfig::validate`] turns it into a
/// [`GradingJob`] or a `Config` error. Keeping the raw record separate lets a
/// configuration failure still be reported as a job result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobConfig {
    /// Opaque job identifier.
    pub job_id: Option<String>,

    /// Git URL or local path of the submission.
    pub repo_url: Option<String>,

    /// Commit, tag or branch to grade.
    pub revision: Option<String>,

    /// Overall timeout in seconds, as text.
    pub timeout_secs: Option<String>,
}

impl JobConfig {
    /// Validate the raw record into an immutable job.
    pub fn validate(&self) -> Result<GradingJob> {
        let repo_url = self
            .repo_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| GradeError::Config("repository URL is required".to_string()))?
            .to_string();

        let timeout_secs = match self.timeout_secs.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_TIMEOUT_SECS,
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                GradeError::Config(format!("timeout must be a whole number of seconds, got '{raw}'"))
            })?,
        };
        if timeout_secs == 0 {
            return Err(GradeError::Config("timeout must be greater than zero".to_string()));
        }

        let revision = self
            .revision
            .as_deref()
            .map(str::trim)
            .filter(|rev| !rev.is_empty())
            .map(str::to_string);

        Ok(GradingJob {
            job_id: self.job_id.clone().unwrap_or_default(),
            repo_url,
            revision,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// A validated grading job. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingJob {
    pub job_id: String,
    pub repo_url: String,
    pub revision: Option<String>,
    pub timeout: Duration,
}

impl GradingJob {
    /// Revision to check out after cloning, or `None` for the default branch.
    pub fn target_revision(&self) -> Option<&str> {
        self.revision
            .as_deref()
            .filter(|rev| !DEFAULT_REVISION_MARKERS.iter().any(|m| m.eq_ignore_ascii_case(rev)))
    }
}

/// Coerce an opaque job token into the numeric id of the result document.
pub fn numeric_job_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}
