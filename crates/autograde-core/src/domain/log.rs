//! Append-only execution log carried in the result document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Category tag of a log entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogKind {
    Info,
    Warning,
    Error,
    /// Compiler and build-tool narration.
    Compilation,
    /// Per-test narration.
    Test,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Info => "INFO",
            LogKind::Warning => "WARNING",
            LogKind::Error => "ERROR",
            LogKind::Compilation => "COMPILATION",
            LogKind::Test => "TEST",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionLogEntry {
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionLogEntry {
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Ordered, append-only sequence of log entries for one job.
///
/// Every append is mirrored to the `tracing` subscriber, which writes to the
/// secondary (stderr) channel. Timestamps never go backwards even if the
/// wall clock does.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Vec<ExecutionLogEntry>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, kind: LogKind, message: impl Into<String>) {
        let mut entry = ExecutionLogEntry::new(kind, message);
        if let Some(last) = self.entries.last() {
            if entry.timestamp < last.timestamp {
                entry.timestamp = last.timestamp;
            }
        }

        match kind {
            LogKind::Info | LogKind::Test => info!(kind = %kind, "{}", entry.message),
            LogKind::Warning => warn!(kind = %kind, "{}", entry.message),
            LogKind::Error => error!(kind = %kind, "{}", entry.message),
            LogKind::Compilation => debug!(kind = %kind, "{}", entry.message),
        }

        self.entries.push(entry);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.append(LogKind::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.append(LogKind::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.append(LogKind::Error, message);
    }

    pub fn compilation(&mut self, message: impl Into<String>) {
        self.append(LogKind::Compilation, message);
    }

    pub fn test(&mut self, message: impl Into<String>) {
        self.append(LogKind::Test, message);
    }

    pub fn entries(&self) -> &[ExecutionLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<ExecutionLogEntry> {
        self.entries
    }
}
