//! JUnit XML report normalization.
//!
//! Surefire and Gradle both write one XML file per test class, with
//! `<testcase>` elements carrying a `name` attribute and an optional nested
//! `<failure>` or `<error>` element. Reports are read with a structural XML
//! parser, so escaped or multi-line failure content is handled correctly.

use autograde_core::{ExecutionLog, TestCaseResult};
use roxmltree::{Document, Node};
use std::path::{Path, PathBuf};

/// Errors reading a single report file.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to read report {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed report {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },
}

/// Fallback detail when a failure element carries no message at all.
const UNSPECIFIED_FAILURE: &str = "Test failed without a message";

/// Parses JUnit-style XML reports into canonical test results.
pub struct ResultParser;

impl ResultParser {
    /// Parse one report document. Results keep document order.
    pub fn parse_str(xml: &str) -> Result<Vec<TestCaseResult>, roxmltree::Error> {
        let doc = Document::parse(xml)?;
        Ok(doc
            .descendants()
            .filter(|n| n.has_tag_name("testcase"))
            .map(parse_testcase)
            .collect())
    }

    pub fn parse_file(path: &Path) -> Result<Vec<TestCaseResult>, ReportError> {
        let xml = std::fs::read_to_string(path).map_err(|source| ReportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&xml).map_err(|source| ReportError::Xml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// XML files directly inside `dir`, sorted by path.
    pub fn report_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().map(|e| e == "xml").unwrap_or(false) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Parse every report in `dir`.
    ///
    /// A missing directory or a malformed file is logged and skipped: by the
    /// time reports are read the build has succeeded, so the job completes
    /// with whatever evidence is available.
    pub fn collect(dir: &Path, log: &mut ExecutionLog) -> Vec<TestCaseResult> {
        let files = match Self::report_files(dir) {
            Ok(files) => files,
            Err(e) => {
                log.warning(format!(
                    "No test reports found at {}: {e}",
                    dir.display()
                ));
                return Vec::new();
            }
        };
        if files.is_empty() {
            log.warning(format!("Test report directory {} is empty", dir.display()));
        }

        let mut results = Vec::new();
        for file in files {
            match Self::parse_file(&file) {
                Ok(parsed) => {
                    log.info(format!(
                        "Parsed {} test case(s) from {}",
                        parsed.len(),
                        file.display()
                    ));
                    results.extend(parsed);
                }
                Err(e) => log.warning(format!("Skipping unreadable test report: {e}")),
            }
        }
        results
    }
}

fn parse_testcase(node: Node<'_, '_>) -> TestCaseResult {
    let name = node.attribute("name").unwrap_or_default();
    let output = captured_output(node);
    let duration_ms = node.attribute("time").and_then(parse_seconds_as_ms);

    let failure = node
        .children()
        .find(|c| c.has_tag_name("failure") || c.has_tag_name("error"));

    let result = match failure {
        None => TestCaseResult::passed(name, output),
        Some(element) => TestCaseResult::failed(name, output, failure_detail(element)),
    };
    result.with_duration_ms(duration_ms)
}

/// Message of a failure/error element: the `message` attribute, else its text.
fn failure_detail(element: Node<'_, '_>) -> String {
    let attribute = element
        .attribute("message")
        .map(str::trim)
        .filter(|m| !m.is_empty());
    let text = element.text().map(str::trim).filter(|t| !t.is_empty());

    attribute
        .or(text)
        .or_else(|| element.attribute("type"))
        .unwrap_or(UNSPECIFIED_FAILURE)
        .to_string()
}

/// Concatenated `system-out` and `system-err` of a test case.
fn captured_output(node: Node<'_, '_>) -> String {
    node.children()
        .filter(|c| c.has_tag_name("system-out") || c.has_tag_name("system-err"))
        .filter_map(|c| c.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `time` attributes are seconds; Surefire may use grouping commas.
fn parse_seconds_as_ms(raw: &str) -> Option<u64> {
    let secs: f64 = raw.trim().replace(',', "").parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| (secs * 1000.0).round() as u64)
}
