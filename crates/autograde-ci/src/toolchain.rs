//! Commands and report locations of manifest-driven toolchains.

use crate::command::CommandSpec;
use autograde_core::ToolchainVariant;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Build tools driven by a manifest file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestTool {
    /// mvn -B clean compile test-compile / mvn -B test
    Maven,

    /// gradle clean compileJava compileTestJava / gradle test --continue
    Gradle,
}

impl ManifestTool {
    pub fn from_variant(variant: ToolchainVariant) -> Option<Self> {
        match variant {
            ToolchainVariant::Maven => Some(ManifestTool::Maven),
            ToolchainVariant::Gradle => Some(ManifestTool::Gradle),
            _ => None,
        }
    }

    /// Wrapper script name checked in by projects.
    pub fn wrapper(&self) -> &'static str {
        match self {
            ManifestTool::Maven => "mvnw",
            ManifestTool::Gradle => "gradlew",
        }
    }

    /// Globally installed executable.
    fn system_executable(&self) -> &'static str {
        match self {
            ManifestTool::Maven => "mvn",
            ManifestTool::Gradle => "gradle",
        }
    }

    /// Wrapper path when the project ships one.
    pub fn wrapper_path(&self, root: &Path) -> Option<PathBuf> {
        let path = root.join(self.wrapper());
        path.is_file().then_some(path)
    }

    /// Executable to invoke: the project wrapper if present, else the system tool.
    pub fn executable(&self, root: &Path) -> String {
        match self.wrapper_path(root) {
            Some(path) => path.to_string_lossy().to_string(),
            None => self.system_executable().to_string(),
        }
    }

    /// Clean and compile main and test sources.
    pub fn build_args(&self) -> Vec<String> {
        match self {
            ManifestTool::Maven => vec![
                "-B".to_string(),
                "clean".to_string(),
                "compile".to_string(),
                "test-compile".to_string(),
            ],
            ManifestTool::Gradle => vec![
                "--no-daemon".to_string(),
                "clean".to_string(),
                "compileJava".to_string(),
                "compileTestJava".to_string(),
            ],
        }
    }

    /// Run tests without stopping at the first failing test.
    pub fn test_args(&self) -> Vec<String> {
        match self {
            ManifestTool::Maven => vec![
                "-B".to_string(),
                "test".to_string(),
                "-Dmaven.test.failure.ignore=true".to_string(),
            ],
            ManifestTool::Gradle => vec![
                "--no-daemon".to_string(),
                "test".to_string(),
                "--continue".to_string(),
            ],
        }
    }

    /// Directory where the toolchain writes JUnit XML reports.
    pub fn report_dir(&self, root: &Path) -> PathBuf {
        match self {
            ManifestTool::Maven => root.join("target").join("surefire-reports"),
            ManifestTool::Gradle => root.join("build").join("test-results").join("test"),
        }
    }

    pub fn build_command(&self, root: &Path, timeout: Duration) -> CommandSpec {
        CommandSpec::new(self.executable(root), self.build_args(), timeout).current_dir(root)
    }

    pub fn test_command(&self, root: &Path, timeout: Duration) -> CommandSpec {
        CommandSpec::new(self.executable(root), self.test_args(), timeout).current_dir(root)
    }
}
