//! Executable units of a manifest-less Java tree and their heuristic verdicts.

use crate::command::{CommandOutput, ExitOutcome};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Source text that marks a unit as a test.
pub const TEST_SOURCE_KEYWORDS: [&str; 3] = ["@Test", "junit", "assert"];

/// Class-name substring (case-insensitive) that marks a unit as a test.
pub const TEST_NAME_MARKER: &str = "test";

/// Output words (case-insensitive) that mark a normally exiting unit failed.
pub const FAILURE_KEYWORDS: [&str; 3] = ["fail", "error", "exception"];

/// A compiled class that can be run on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaUnit {
    /// Fully qualified class name.
    pub class_name: String,
    pub source: PathBuf,
    pub mentions_tests: bool,
    pub has_main: bool,
}

impl JavaUnit {
    /// Derive the unit for a source file from its text.
    pub fn from_source(path: &Path, text: &str) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let class_name = match package_name(text) {
            Some(package) => format!("{package}.{stem}"),
            None => stem,
        };

        Self {
            class_name,
            source: path.to_path_buf(),
            mentions_tests: TEST_SOURCE_KEYWORDS.iter().any(|k| text.contains(k)),
            has_main: declares_main(text),
        }
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_source(path, &text))
    }

    pub fn looks_like_test(&self) -> bool {
        self.mentions_tests
            || self
                .class_name
                .rsplit('.')
                .next()
                .map(|simple| simple.to_ascii_lowercase().contains(TEST_NAME_MARKER))
                .unwrap_or(false)
    }
}

/// Pick units to execute: test-like units, else entry points, else everything.
pub fn select_units(units: &[JavaUnit]) -> Vec<&JavaUnit> {
    let tests: Vec<&JavaUnit> = units.iter().filter(|u| u.looks_like_test()).collect();
    if !tests.is_empty() {
        return tests;
    }
    let mains: Vec<&JavaUnit> = units.iter().filter(|u| u.has_main).collect();
    if !mains.is_empty() {
        return mains;
    }
    units.iter().collect()
}

/// Heuristic verdict for one unit run: `(passed, error detail)`.
///
/// Timeouts and abnormal exits always fail. A normal exit fails when the
/// output mentions a failure keyword. This can misclassify a passing unit
/// that prints "error", or a broken one that prints nothing.
pub fn classify(output: &CommandOutput, timeout: Duration) -> (bool, Option<String>) {
    match output.outcome {
        ExitOutcome::TimedOut => (
            false,
            Some(format!("Timed out after {} seconds", timeout.as_secs())),
        ),
        ExitOutcome::Signaled => (
            false,
            Some("Process exited abnormally (terminated by signal)".to_string()),
        ),
        ExitOutcome::Exited(code) if code != 0 => (
            false,
            Some(format!("Process exited abnormally (exit code {code})")),
        ),
        ExitOutcome::Exited(_) => {
            let text = output.combined().to_lowercase();
            match FAILURE_KEYWORDS.iter().find(|k| text.contains(*k)) {
                Some(keyword) => (
                    false,
                    Some(format!("Output contains failure keyword '{keyword}'")),
                ),
                None => (true, None),
            }
        }
    }
}

fn package_name(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("package "))
        .map(|rest| rest.trim().trim_end_matches(';').trim().to_string())
        .filter(|name| !name.is_empty())
}

fn declares_main(text: &str) -> bool {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let flattened = flattened.replace(" (", "(");
    flattened.contains("static void main(") || flattened.contains("static public void main(")
}
