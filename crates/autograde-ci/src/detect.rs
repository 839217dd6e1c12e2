//! Toolchain detection over an acquired source tree.

use autograde_core::{GradeError, Result, ToolchainVariant};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Maven project object model.
pub const MAVEN_MANIFEST: &str = "pom.xml";

/// Any of these at the root marks a Gradle build.
pub const GRADLE_MANIFESTS: [&str; 4] = [
    "build.gradle",
    "build.gradle.kts",
    "settings.gradle",
    "settings.gradle.kts",
];

/// Classifies a source tree. Pure inspection, no side effects.
pub struct ToolchainDetector;

impl ToolchainDetector {
    /// Classify the tree; first match wins.
    pub fn classify(root: &Path) -> ToolchainVariant {
        if root.join(MAVEN_MANIFEST).is_file() {
            ToolchainVariant::Maven
        } else if GRADLE_MANIFESTS.iter().any(|m| root.join(m).is_file()) {
            ToolchainVariant::Gradle
        } else if has_files_with_extension(root, "java") {
            ToolchainVariant::PlainJavac
        } else {
            ToolchainVariant::Unsupported
        }
    }

    /// Classify the tree, failing on [`ToolchainVariant::Unsupported`].
    pub fn detect(root: &Path) -> Result<ToolchainVariant> {
        match Self::classify(root) {
            ToolchainVariant::Unsupported => Err(GradeError::UnsupportedToolchain),
            variant => Ok(variant),
        }
    }
}

/// All `*.java` files under `root`, sorted.
pub fn find_java_sources(root: &Path) -> Vec<PathBuf> {
    files_with_extension(root, "java")
}

/// All `*.jar` files under `root`, sorted.
pub fn find_jars(root: &Path) -> Vec<PathBuf> {
    files_with_extension(root, "jar")
}

fn files_with_extension(root: &Path, ext: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = source_entries(root)
        .filter(|e| has_extension(e.path(), ext))
        .map(DirEntry::into_path)
        .collect();
    files.sort();
    files
}

fn has_files_with_extension(root: &Path, ext: &str) -> bool {
    source_entries(root).any(|e| has_extension(e.path(), ext))
}

/// Regular files under `root`, skipping hidden directories such as `.git`.
fn source_entries(root: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().map(|e| e == ext).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_maven_wins_over_everything() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "pom.xml");
        touch(dir.path(), "build.gradle");
        touch(dir.path(), "src/Main.java");
        assert_eq!(ToolchainDetector::classify(dir.path()), ToolchainVariant::Maven);
    }

    #[test]
    fn test_gradle_manifests() {
        for manifest in GRADLE_MANIFESTS {
            let dir = tempfile::tempdir().unwrap();
            touch(dir.path(), manifest);
            touch(dir.path(), "src/main/java/App.java");
            assert_eq!(
                ToolchainDetector::classify(dir.path()),
                ToolchainVariant::Gradle,
                "{manifest}"
            );
        }
    }

    #[test]
    fn test_nested_java_sources_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a/b/c/Deep.java");
        assert_eq!(
            ToolchainDetector::detect(dir.path()).unwrap(),
            ToolchainVariant::PlainJavac
        );
    }

    #[test]
    fn test_manifest_in_subdirectory_does_not_count() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "module/pom.xml");
        touch(dir.path(), "module/Foo.java");
        assert_eq!(
            ToolchainDetector::classify(dir.path()),
            ToolchainVariant::PlainJavac
        );
    }

    #[test]
    fn test_unsupported_tree() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "README.md");
        touch(dir.path(), "main.py");
        touch(dir.path(), ".git/objects/Hidden.java");
        assert_eq!(
            ToolchainDetector::classify(dir.path()),
            ToolchainVariant::Unsupported
        );
        assert!(matches!(
            ToolchainDetector::detect(dir.path()),
            Err(GradeError::UnsupportedToolchain)
        ));
    }

    #[test]
    fn test_detection_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/Calc.java");
        let first = ToolchainDetector::classify(dir.path());
        let second = ToolchainDetector::classify(dir.path());
        assert_eq!(first, second);
    }

    #[test]
    fn test_find_sources_and_jars_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "z/Zed.java");
        touch(dir.path(), "a/Alpha.java");
        touch(dir.path(), "lib/junit.jar");
        touch(dir.path(), "notes.txt");

        let sources = find_java_sources(dir.path());
        assert_eq!(
            sources,
            vec![dir.path().join("a/Alpha.java"), dir.path().join("z/Zed.java")]
        );
        assert_eq!(find_jars(dir.path()), vec![dir.path().join("lib/junit.jar")]);
    }
}
