//! autograde CI - build and test orchestration for graded Java submissions
//!
//! Provides a grading pipeline that:
//! - Clones a submission and pins the requested revision
//! - Detects Maven, Gradle or a plain javac tree
//! - Compiles and runs tests under deadlines
//! - Normalizes JUnit reports or unit runs into one result document

pub mod acquire;
pub mod build;
pub mod command;
pub mod context;
pub mod detect;
pub mod fakes;
pub mod pipeline;
pub mod report;
pub mod session;
pub mod test_run;
pub mod toolchain;
pub mod units;

// Re-export key types
pub use acquire::RepositoryAcquirer;
pub use build::{BuildExecutor, CLASSES_DIR};
pub use command::{CommandOutput, CommandRunner, CommandSpec, ExitOutcome, SystemCommandRunner};
pub use context::JobContext;
pub use detect::ToolchainDetector;
pub use pipeline::GradingPipeline;
pub use report::{ReportError, ResultParser};
pub use session::{GradingSession, SessionOptions};
pub use test_run::{TestExecutor, UNIT_TIMEOUT};
pub use toolchain::ManifestTool;
pub use units::{JavaUnit, FAILURE_KEYWORDS, TEST_SOURCE_KEYWORDS};
