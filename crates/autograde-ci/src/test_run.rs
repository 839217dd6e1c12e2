//! Test stage: run the suite and normalize every outcome into test results.

use crate::build::unit_classpath;
use crate::command::{CommandRunner, CommandSpec};
use crate::context::JobContext;
use crate::detect::find_java_sources;
use crate::report::ResultParser;
use crate::toolchain::ManifestTool;
use crate::units::{classify, select_units, JavaUnit};
use autograde_core::{GradeError, Result, TestCaseResult, ToolchainVariant};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Deadline for a single manifest-less unit.
pub const UNIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs tests of a built tree and records their results in the context.
pub struct TestExecutor<'a> {
    runner: &'a dyn CommandRunner,
    unit_timeout: Duration,
}

impl<'a> TestExecutor<'a> {
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

    /// Run the tests for `variant`. Returns the number of results recorded.
    ///
    /// Failing tests are results, not errors; an error here means the stage
    /// itself could not proceed.
    pub async fn run(
        &self,
        variant: ToolchainVariant,
        root: &Path,
        ctx: &mut JobContext,
    ) -> Result<usize> {
        match ManifestTool::from_variant(variant) {
            Some(tool) => self.run_manifest_tests(tool, root, ctx).await,
            None if variant == ToolchainVariant::PlainJavac => self.run_units(root, ctx).await,
            None => Err(GradeError::UnsupportedToolchain),
        }
    }

    async fn run_manifest_tests(
        &self,
        tool: ManifestTool,
        root: &Path,
        ctx: &mut JobContext,
    ) -> Result<usize> {
        let spec = tool.test_command(root, ctx.remaining());
        ctx.log().info(format!("Running {}", spec.display()));

        match self.runner.run(&spec).await {
            Ok(output) if output.timed_out() => {
                ctx.log().warning(format!(
                    "Test command {}; reading whatever reports were written",
                    output.describe(spec.timeout)
                ));
            }
            Ok(output) => {
                // Non-zero usually just means some tests failed; reports decide.
                debug!(exit_code = output.exit_code(), "Test command finished");
                ctx.log().info(format!(
                    "Test command {}",
                    output.describe(spec.timeout)
                ));
            }
            Err(e) => {
                warn!(error = %e, program = %spec.program, "Test command could not start");
                ctx.log()
                    .warning(format!("Failed to start {}: {e}", spec.program));
            }
        }

        let results = ResultParser::collect(&tool.report_dir(root), ctx.log());
        let count = results.len();
        for result in results {
            ctx.push_test(result)?;
        }
        Ok(count)
    }

    async fn run_units(&self, root: &Path, ctx: &mut JobContext) -> Result<usize> {
        let mut units = Vec::new();
        for source in find_java_sources(root) {
            match JavaUnit::load(&source) {
                Ok(unit) => units.push(unit),
                Err(e) => ctx
                    .log()
                    .warning(format!("Skipping unreadable source {}: {e}", source.display())),
            }
        }

        let selected = select_units(&units);
        if selected.is_empty() {
            ctx.log().warning("No executable units found");
            return Ok(0);
        }
        ctx.log().info(format!(
            "Running {} unit(s) with a {}s limit each",
            selected.len(),
            self.unit_timeout.as_secs()
        ));

        let classpath = unit_classpath(root);
        for unit in &selected {
            let result = self.run_unit(unit, &classpath, root).await;
            ctx.push_test(result)?;
        }
        Ok(selected.len())
    }

    async fn run_unit(&self, unit: &JavaUnit, classpath: &str, root: &Path) -> TestCaseResult {
        let spec = CommandSpec::new(
            "java",
            ["-cp", classpath, unit.class_name.as_str()],
            self.unit_timeout,
        )
        .current_dir(root);

        match self.runner.run(&spec).await {
            Ok(output) => {
                let (passed, detail) = classify(&output, self.unit_timeout);
                debug!(unit = %unit.class_name, passed, outcome = ?output.outcome, "Unit finished");
                let result = match detail {
                    Some(detail) if !passed => {
                        TestCaseResult::failed(&unit.class_name, output.combined(), detail)
                    }
                    _ => TestCaseResult::passed(&unit.class_name, output.combined()),
                };
                result.with_duration_ms(Some(output.duration_ms))
            }
            Err(e) => TestCaseResult::failed(
                &unit.class_name,
                "",
                format!("Failed to start java: {e}"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, ExitOutcome};
    use crate::fakes::{ScriptedCommandRunner, ScriptedReply};
    use autograde_core::{JobState, LogKind};

    fn built_context() -> JobContext {
        let mut ctx = JobContext::new("1");
        for state in [JobState::Acquired, JobState::Detected, JobState::Built] {
            ctx.advance(state).unwrap();
        }
        ctx
    }

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_maven_reports_collected() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedCommandRunner::new().on(
            "mvn -B test",
            ScriptedReply::handler(|spec| {
                let reports = spec.cwd.as_ref().unwrap().join("target/surefire-reports");
                std::fs::create_dir_all(&reports)?;
                std::fs::write(
                    reports.join("TEST-CalcTest.xml"),
                    r#"<testsuite><testcase name="testAdd"/>
                       <testcase name="testDiv"><failure message="boom"/></testcase></testsuite>"#,
                )?;
                Ok(CommandOutput::new(ExitOutcome::Exited(1), "Tests run: 2, Failures: 1", ""))
            }),
        );
        let mut ctx = built_context();

        let count = TestExecutor::new(&runner)
            .run(ToolchainVariant::Maven, dir.path(), &mut ctx)
            .await
            .unwrap();

        assert_eq!(count, 2);
        let results = ctx.test_results();
        assert_eq!(results[0].test_name, "testAdd");
        assert!(results[0].passed);
        assert_eq!(results[1].error_output.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_test_command_timeout_still_reads_reports() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "build/test-results/test/TEST-A.xml",
            r#"<testsuite><testcase name="early"/></testsuite>"#,
        );
        let runner = ScriptedCommandRunner::new().on("test --continue", ScriptedReply::timed_out());
        let mut ctx = built_context();

        let count = TestExecutor::new(&runner)
            .run(ToolchainVariant::Gradle, dir.path(), &mut ctx)
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert!(ctx
            .execution_log()
            .entries()
            .iter()
            .any(|e| e.kind == LogKind::Warning && e.message.contains("timed out")));
    }

    #[tokio::test]
    async fn test_units_run_with_classification() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Calc.java", "public class Calc {}");
        write(
            dir.path(),
            "CalcTest.java",
            "public class CalcTest { public static void main(String[] a) {} }",
        );
        write(
            dir.path(),
            "src/demo/SlowTest.java",
            "package demo;\npublic class SlowTest { public static void main(String[] a) {} }",
        );

        let runner = ScriptedCommandRunner::new()
            .on("demo.SlowTest", ScriptedReply::timed_out())
            .on("CalcTest", ScriptedReply::ok("All checks passed"));
        let mut ctx = built_context();

        let count = TestExecutor::new(&runner)
            .with_unit_timeout(Duration::from_secs(5))
            .run(ToolchainVariant::PlainJavac, dir.path(), &mut ctx)
            .await
            .unwrap();

        assert_eq!(count, 2);
        let results = ctx.test_results();
        assert_eq!(results[0].test_name, "CalcTest");
        assert!(results[0].passed);
        assert_eq!(results[1].test_name, "demo.SlowTest");
        assert!(!results[1].passed);
        assert_eq!(
            results[1].error_output.as_deref(),
            Some("Timed out after 5 seconds")
        );

        let call = &runner.calls()[0];
        assert_eq!(call.program, "java");
        assert_eq!(call.timeout, Duration::from_secs(5));
        assert!(call.args[1].contains(".autograde-classes"));
    }

    #[tokio::test]
    async fn test_unit_spawn_failure_is_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "App.java",
            "class App { public static void main(String[] a) {} }",
        );
        let runner = ScriptedCommandRunner::new().on("java", ScriptedReply::SpawnError);
        let mut ctx = built_context();

        TestExecutor::new(&runner)
            .run(ToolchainVariant::PlainJavac, dir.path(), &mut ctx)
            .await
            .unwrap();

        let result = &ctx.test_results()[0];
        assert_eq!(result.test_name, "App");
        assert!(!result.passed);
        assert!(result.error_output.as_deref().unwrap().contains("Failed to start java"));
    }

    #[tokio::test]
    async fn test_push_outside_built_state_fails() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "AppTest.java", "class AppTest {}");
        let runner = ScriptedCommandRunner::new();
        let mut ctx = JobContext::new("1");

        let err = TestExecutor::new(&runner)
            .run(ToolchainVariant::PlainJavac, dir.path(), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, GradeError::Internal(_)));
    }
}
