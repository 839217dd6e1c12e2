//! Build toolchain classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Build toolchain a submission is binned into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ToolchainVariant {
    /// `pom.xml` at the project root.
    Maven,

    /// Gradle build or settings script at the project root.
    Gradle,

    /// No manifest, but Java sources somewhere in the tree.
    PlainJavac,

    /// Nothing we know how to build.
    Unsupported,
}

impl ToolchainVariant {
    pub fn name(&self) -> &'static str {
        match self {
            ToolchainVariant::Maven => "maven",
            ToolchainVariant::Gradle => "gradle",
            ToolchainVariant::PlainJavac => "plain_javac",
            ToolchainVariant::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for ToolchainVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_names() {
        assert_eq!(ToolchainVariant::Maven.name(), "maven");
        assert_eq!(ToolchainVariant::Gradle.name(), "gradle");
        assert_eq!(ToolchainVariant::PlainJavac.to_string(), "plain_javac");
        assert_eq!(ToolchainVariant::Unsupported.to_string(), "unsupported");
    }
}
