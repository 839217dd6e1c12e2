//! Job lifecycle state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::{GradeError, Result};

/// Lifecycle state of a grading job.
///
/// Success path: `Init -> Acquired -> Detected -> Built -> Tested -> Emitted`.
/// `Failed` is reachable from every non-terminal state. `Emitted` and
/// `Failed` are terminal and are entered exactly once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    Init,
    Acquired,
    Detected,
    Built,
    Tested,
    Emitted,
    Failed,
}

impl JobState {
    /// Whether no further transition is allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Emitted | JobState::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: JobState) -> bool {
        match (self, next) {
            (JobState::Init, JobState::Acquired)
            | (JobState::Acquired, JobState::Detected)
            | (JobState::Detected, JobState::Built)
            | (JobState::Built, JobState::Tested)
            | (JobState::Tested, JobState::Emitted) => true,
            (current, JobState::Failed) => !current.is_terminal(),
            _ => false,
        }
    }

    /// Validate and return the next state.
    pub fn transition(self, next: JobState) -> Result<JobState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(GradeError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Init => "INIT",
            JobState::Acquired => "ACQUIRED",
            JobState::Detected => "DETECTED",
            JobState::Built => "BUILT",
            JobState::Tested => "TESTED",
            JobState::Emitted => "EMITTED",
            JobState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_path() {
        let mut state = JobState::Init;
        for next in [
            JobState::Acquired,
            JobState::Detected,
            JobState::Built,
            JobState::Tested,
            JobState::Emitted,
        ] {
            state = state.transition(next).expect("legal transition");
        }
        assert!(state.is_terminal());
    }

    #[test]
    fn test_failed_reachable_from_any_non_terminal_state() {
        for state in [
            JobState::Init,
            JobState::Acquired,
            JobState::Detected,
            JobState::Built,
            JobState::Tested,
        ] {
            assert!(state.can_transition_to(JobState::Failed), "{state}");
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        assert!(!JobState::Emitted.can_transition_to(JobState::Failed));
        assert!(!JobState::Failed.can_transition_to(JobState::Emitted));
        assert!(!JobState::Failed.can_transition_to(JobState::Failed));
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        let err = JobState::Acquired.transition(JobState::Built).unwrap_err();
        assert!(matches!(
            err,
            GradeError::InvalidTransition {
                from: JobState::Acquired,
                to: JobState::Built
            }
        ));
        assert!(!JobState::Built.can_transition_to(JobState::Emitted));
    }
}
