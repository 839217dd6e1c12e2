//! Compile stage, one strategy per toolchain variant.

use crate::command::{CommandRunner, CommandSpec};
use crate::context::JobContext;
use crate::detect::{find_jars, find_java_sources};
use crate::toolchain::ManifestTool;
use autograde_core::{CompilationRecord, GradeError, Result, ToolchainVariant};
use std::path::{Path, PathBuf};
use tracing::info;

/// Scratch directory (inside the working tree) for manifest-less builds.
pub const CLASSES_DIR: &str = ".autograde-classes";

/// javac argument file listing every source.
const SOURCES_ARGFILE: &str = "sources.txt";

/// Classpath for running compiled units: the scratch output plus any jars
/// shipped in the tree.
pub fn unit_classpath(root: &Path) -> String {
    let mut entries = vec![root.join(CLASSES_DIR)];
    entries.extend(find_jars(root));
    join_classpath(&entries)
}

fn join_classpath(entries: &[PathBuf]) -> String {
    let separator = if cfg!(windows) { ";" } else { ":" };
    entries
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Compiles the acquired tree.
pub struct BuildExecutor<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Compile with the strategy for `variant`.
    ///
    /// The compilation record is stored in `ctx` before any failure is
    /// returned, so the transcript reaches the result document either way.
    pub async fn build(
        &self,
        variant: ToolchainVariant,
        root: &Path,
        ctx: &mut JobContext,
    ) -> Result<CompilationRecord> {
        match ManifestTool::from_variant(variant) {
            Some(tool) => self.build_with_manifest(tool, root, ctx).await,
            None if variant == ToolchainVariant::PlainJavac => self.build_plain(root, ctx).await,
            None => Err(GradeError::UnsupportedToolchain),
        }
    }

    async fn build_with_manifest(
        &self,
        tool: ManifestTool,
        root: &Path,
        ctx: &mut JobContext,
    ) -> Result<CompilationRecord> {
        if let Some(wrapper) = tool.wrapper_path(root) {
            make_executable(&wrapper)?;
        }
        let spec = tool.build_command(root, ctx.remaining());
        self.compile(spec, ctx).await
    }

    async fn build_plain(&self, root: &Path, ctx: &mut JobContext) -> Result<CompilationRecord> {
        let sources = find_java_sources(root);
        if sources.is_empty() {
            ctx.set_compilation(CompilationRecord::new(false, ""));
            return Err(GradeError::NoSourceFound);
        }
        ctx.log()
            .compilation(format!("Found {} Java source file(s)", sources.len()));

        let classes = root.join(CLASSES_DIR);
        std::fs::create_dir_all(&classes)?;
        let argfile = classes.join(SOURCES_ARGFILE);
        std::fs::write(&argfile, javac_argfile(&sources))?;

        let mut args = vec![
            "-encoding".to_string(),
            "UTF-8".to_string(),
            "-d".to_string(),
            classes.to_string_lossy().to_string(),
        ];
        let jars = find_jars(root);
        if !jars.is_empty() {
            args.push("-cp".to_string());
            args.push(join_classpath(&jars));
        }
        args.push(format!("@{}", argfile.to_string_lossy()));

        let spec = CommandSpec::new("javac", args, ctx.remaining()).current_dir(root);
        self.compile(spec, ctx).await
    }

    /// Run a compile command and record its transcript.
    async fn compile(&self, spec: CommandSpec, ctx: &mut JobContext) -> Result<CompilationRecord> {
        ctx.log().compilation(format!("Running {}", spec.display()));

        let (record, failure) = match self.runner.run(&spec).await {
            Ok(output) => {
                let success = output.success();
                let record = CompilationRecord::new(success, output.combined());
                let failure = (!success).then(|| {
                    format!("{} {}", spec.program, output.describe(spec.timeout))
                });
                (record, failure)
            }
            Err(e) => {
                let message = format!("failed to start {}: {e}", spec.program);
                (CompilationRecord::new(false, message.clone()), Some(message))
            }
        };

        ctx.set_compilation(record.clone());
        match failure {
            Some(reason) => {
                ctx.log().error(format!("Compilation failed: {reason}"));
                Err(GradeError::CompilationFailed { reason })
            }
            None => {
                info!(command = %spec.display(), "Compilation succeeded");
                ctx.log().compilation("Compilation succeeded");
                Ok(record)
            }
        }
    }
}

/// javac @argfile contents: one quoted path per line.
fn javac_argfile(sources: &[PathBuf]) -> String {
    sources
        .iter()
        .map(|p| {
            let escaped = p.to_string_lossy().replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\"\n")
        })
        .collect()
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    std::fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, ExitOutcome};
    use crate::fakes::{ScriptedCommandRunner, ScriptedReply};
    use autograde_core::JobState;

    fn built_ready_context() -> JobContext {
        let mut ctx = JobContext::new("1");
        ctx.advance(JobState::Acquired).unwrap();
        ctx.advance(JobState::Detected).unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_maven_build_success() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedCommandRunner::new().on("mvn", ScriptedReply::ok("BUILD SUCCESS"));
        let mut ctx = built_ready_context();

        let record = BuildExecutor::new(&runner)
            .build(ToolchainVariant::Maven, dir.path(), &mut ctx)
            .await
            .unwrap();

        assert!(record.success);
        assert_eq!(record.transcript, "BUILD SUCCESS");
        assert_eq!(ctx.compilation(), Some(&record));
        assert_eq!(runner.call_lines(), ["mvn -B clean compile test-compile"]);
    }

    #[tokio::test]
    async fn test_gradle_build_failure_keeps_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedCommandRunner::new().on(
            "gradle",
            ScriptedReply::exit(1, "Calc.java:3: error: ';' expected"),
        );
        let mut ctx = built_ready_context();

        let err = BuildExecutor::new(&runner)
            .build(ToolchainVariant::Gradle, dir.path(), &mut ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, GradeError::CompilationFailed { .. }));
        assert_eq!(err.exit_code(), 2);
        let record = ctx.compilation().unwrap();
        assert!(!record.success);
        assert!(record.transcript.contains("';' expected"));
    }

    #[tokio::test]
    async fn test_build_timeout_is_compilation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedCommandRunner::new().on(
            "mvn",
            ScriptedReply::Output(CommandOutput::new(
                ExitOutcome::TimedOut,
                "[INFO] Compiling 3 source files",
                "",
            )),
        );
        let mut ctx = built_ready_context();

        let err = BuildExecutor::new(&runner)
            .build(ToolchainVariant::Maven, dir.path(), &mut ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        let record = ctx.compilation().unwrap();
        assert!(!record.success);
        assert_eq!(record.transcript, "[INFO] Compiling 3 source files");
    }

    #[tokio::test]
    async fn test_missing_tool_is_compilation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedCommandRunner::new().on("mvn", ScriptedReply::SpawnError);
        let mut ctx = built_ready_context();

        let err = BuildExecutor::new(&runner)
            .build(ToolchainVariant::Maven, dir.path(), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, GradeError::CompilationFailed { .. }));
        assert!(ctx.compilation().unwrap().transcript.contains("failed to start mvn"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_gradle_wrapper_made_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let wrapper = dir.path().join("gradlew");
        std::fs::write(&wrapper, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&wrapper, std::fs::Permissions::from_mode(0o644)).unwrap();

        let runner = ScriptedCommandRunner::new();
        let mut ctx = built_ready_context();
        BuildExecutor::new(&runner)
            .build(ToolchainVariant::Gradle, dir.path(), &mut ctx)
            .await
            .unwrap();

        let mode = std::fs::metadata(&wrapper).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
        assert!(runner.calls()[0].program.ends_with("gradlew"));
    }

    #[tokio::test]
    async fn test_plain_build_without_sources() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedCommandRunner::new();
        let mut ctx = built_ready_context();

        let err = BuildExecutor::new(&runner)
            .build(ToolchainVariant::PlainJavac, dir.path(), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, GradeError::NoSourceFound));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_plain_build_uses_argfile_and_jars() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/pkg")).unwrap();
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();
        std::fs::write(dir.path().join("src/pkg/A.java"), "package pkg; class A {}").unwrap();
        std::fs::write(dir.path().join("B.java"), "class B {}").unwrap();
        std::fs::write(dir.path().join("lib/junit.jar"), "").unwrap();

        let runner = ScriptedCommandRunner::new();
        let mut ctx = built_ready_context();
        let record = BuildExecutor::new(&runner)
            .build(ToolchainVariant::PlainJavac, dir.path(), &mut ctx)
            .await
            .unwrap();
        assert!(record.success);

        let call = &runner.calls()[0];
        assert_eq!(call.program, "javac");
        assert!(call.args.iter().any(|a| a.ends_with("junit.jar")));
        let argfile = call.args.last().unwrap().trim_start_matches('@').to_string();
        let listed = std::fs::read_to_string(argfile).unwrap();
        assert_eq!(listed.lines().count(), 2);
        assert!(listed.contains("B.java"));
        assert!(listed.contains("A.java"));
    }

    #[test]
    fn test_unsupported_variant_rejected() {
        let runner = ScriptedCommandRunner::new();
        let mut ctx = built_ready_context();
        let result = futures::executor::block_on(BuildExecutor::new(&runner).build(
            ToolchainVariant::Unsupported,
            Path::new("."),
            &mut ctx,
        ));
        assert!(matches!(result, Err(GradeError::UnsupportedToolchain)));
    }

    #[test]
    fn test_argfile_quotes_paths() {
        let content = javac_argfile(&[PathBuf::from("/tmp/my dir/A.java")]);
        assert_eq!(content, "\"/tmp/my dir/A.java\"\n");
    }
}
