//! External command execution with deadlines.
//!
//! Every toolchain call (git, mvn, gradle, javac, java) goes through
//! [`CommandRunner`], so build and test strategies differ only in the
//! command they issue and how they read the result.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Upper bound on captured bytes per stream.
pub const MAX_CAPTURED_OUTPUT: usize = 1024 * 1024;

const TRUNCATION_MARKER: &str = "\n... [output truncated]";

/// How long to keep reading after the process ends.
const OUTPUT_GRACE: Duration = Duration::from_millis(200);

const READ_CHUNK: usize = 8 * 1024;

/// A single external invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,

    /// Arguments passed to the program.
    pub args: Vec<String>,

    /// Working directory (inherits ours when `None`).
    pub cwd: Option<PathBuf>,

    /// Deadline for the whole invocation.
    pub timeout: Duration,

    /// Extra environment variables.
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            timeout,
            env: Vec::new(),
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Normal exit with a status code.
    Exited(i32),

    /// Killed by a signal.
    Signaled,

    /// Deadline elapsed; the process was killed.
    TimedOut,
}

/// Captured result of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub outcome: ExitOutcome,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn new(outcome: ExitOutcome, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            outcome,
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration_ms: 0,
        }
    }

    /// Whether the command exited with code 0.
    pub fn success(&self) -> bool {
        self.outcome == ExitOutcome::Exited(0)
    }

    pub fn timed_out(&self) -> bool {
        self.outcome == ExitOutcome::TimedOut
    }

    /// Exit code, or -1 when the process did not exit normally.
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            ExitOutcome::Exited(code) => code,
            _ => -1,
        }
    }

    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => {
                let mut out = self.stdout.clone();
                if !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&self.stderr);
                out
            }
        }
    }

    /// Short description of how the command ended.
    pub fn describe(&self, timeout: Duration) -> String {
        match self.outcome {
            ExitOutcome::Exited(code) => format!("exited with code {code}"),
            ExitOutcome::Signaled => "terminated by signal".to_string(),
            ExitOutcome::TimedOut => format!("timed out after {} seconds", timeout.as_secs()),
        }
    }
}

/// Executes external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion or until its deadline.
    ///
    /// A deadline violation is a normal `TimedOut` outcome; only a failure
    /// to spawn the process is an error.
    async fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutput>;
}

/// Runs commands as child processes via tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutput> {
        let start = Instant::now();

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        debug!(
            command = %spec.display(),
            timeout_secs = spec.timeout.as_secs(),
            "Spawning command"
        );
        let mut child = cmd.spawn()?;

        let stdout = SharedCapture::default();
        let stderr = SharedCapture::default();
        let readers = [
            child
                .stdout
                .take()
                .map(|pipe| tokio::spawn(drain(pipe, stdout.clone()))),
            child
                .stderr
                .take()
                .map(|pipe| tokio::spawn(drain(pipe, stderr.clone()))),
        ];

        let outcome = match tokio::time::timeout(spec.timeout, child.wait()).await {
            Ok(status) => match status?.code() {
                Some(code) => ExitOutcome::Exited(code),
                None => ExitOutcome::Signaled,
            },
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!(command = %spec.display(), error = %e, "Failed to kill timed-out command");
                }
                ExitOutcome::TimedOut
            }
        };

        // Descendants may still hold the pipes open; stop reading after a grace period.
        for mut reader in readers.into_iter().flatten() {
            if tokio::time::timeout(OUTPUT_GRACE, &mut reader).await.is_err() {
                reader.abort();
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(command = %spec.display(), ?outcome, duration_ms, "Command finished");

        let stdout = lock(&stdout).decode();
        let stderr = lock(&stderr).decode();
        Ok(CommandOutput {
            outcome,
            stdout,
            stderr,
            duration_ms,
        })
    }
}

/// Bytes kept from one output stream.
#[derive(Debug, Default)]
struct Capture {
    bytes: Vec<u8>,
    truncated: bool,
}

type SharedCapture = Arc<Mutex<Capture>>;

impl Capture {
    /// Keep up to [`MAX_CAPTURED_OUTPUT`] bytes; the rest is dropped.
    fn push(&mut self, chunk: &[u8]) {
        let room = MAX_CAPTURED_OUTPUT.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    /// Decode as text, marking truncated streams.
    fn decode(&self) -> String {
        let text = String::from_utf8_lossy(&self.bytes);
        if !self.truncated && text.len() <= MAX_CAPTURED_OUTPUT {
            return text.into_owned();
        }
        let mut cut = text.len().min(MAX_CAPTURED_OUTPUT);
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        let mut out = text[..cut].to_string();
        out.push_str(TRUNCATION_MARKER);
        out
    }
}

fn lock(capture: &SharedCapture) -> MutexGuard<'_, Capture> {
    capture.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read `pipe` to EOF, keeping a bounded prefix.
async fn drain<R>(mut pipe: R, sink: SharedCapture)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => lock(&sink).push(&chunk[..n]),
            Err(e) => {
                debug!(error = %e, "Output pipe read failed");
                break;
            }
        }
    }
}
