//! Scripted command runner (testing only)
//!
//! Provides `ScriptedCommandRunner`, a `CommandRunner` that answers commands
//! from a list of rules instead of spawning processes, so toolchain scenarios
//! can be exercised without git, Maven, Gradle or a JDK installed.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::command::{CommandOutput, CommandRunner, CommandSpec, ExitOutcome};

type Handler = Arc<dyn Fn(&CommandSpec) -> std::io::Result<CommandOutput> + Send + Sync>;

/// What a matched command does.
#[derive(Clone)]
pub enum ScriptedReply {
    /// Return a fixed output.
    Output(CommandOutput),

    /// Never complete; only a dropped future (shutdown) ends it.
    Hang,

    /// Fail to spawn with `NotFound`.
    SpawnError,

    /// Compute the reply, possibly touching the filesystem.
    Handler(Handler),
}

impl ScriptedReply {
    pub fn ok(stdout: impl Into<String>) -> Self {
        ScriptedReply::Output(CommandOutput::new(ExitOutcome::Exited(0), stdout, ""))
    }

    pub fn exit(code: i32, stderr: impl Into<String>) -> Self {
        ScriptedReply::Output(CommandOutput::new(ExitOutcome::Exited(code), "", stderr))
    }

    pub fn timed_out() -> Self {
        ScriptedReply::Output(CommandOutput::new(ExitOutcome::TimedOut, "", ""))
    }

    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(&CommandSpec) -> std::io::Result<CommandOutput> + Send + Sync + 'static,
    {
        ScriptedReply::Handler(Arc::new(f))
    }

    /// Write `files` (relative path, contents) under the command's last
    /// argument, as `git clone <url> <dest>` would, then succeed.
    pub fn materialize(files: Vec<(String, String)>) -> Self {
        Self::handler(move |spec| {
            let dest = spec
                .args
                .last()
                .map(PathBuf::from)
                .ok_or_else(|| std::io::Error::other("no destination argument"))?;
            std::fs::create_dir_all(&dest)?;
            for (rel, contents) in &files {
                let path = dest.join(rel);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, contents)?;
            }
            Ok(CommandOutput::new(ExitOutcome::Exited(0), "", "Cloning into 'source'...\n"))
        })
    }
}

struct Rule {
    pattern: String,
    reply: ScriptedReply,
}

/// `CommandRunner` answering from substring rules on the rendered command.
///
/// The first rule whose pattern occurs in `CommandSpec::display()` wins.
/// Unmatched commands succeed with empty output. Every call is recorded.
#[derive(Default)]
pub struct ScriptedCommandRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, pattern: impl Into<String>, reply: ScriptedReply) -> Self {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.into(),
            reply,
        });
        self
    }

    /// Commands received so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Rendered commands received so far.
    pub fn call_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::display).collect()
    }

    fn reply_for(&self, spec: &CommandSpec) -> Option<ScriptedReply> {
        let line = spec.display();
        self.rules
            .lock()
            .unwrap()
            .iter()
            .find(|rule| line.contains(&rule.pattern))
            .map(|rule| rule.reply.clone())
    }
}

#[async_trait]
impl CommandRunner for ScriptedCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());

        match self.reply_for(spec) {
            None => Ok(CommandOutput::new(ExitOutcome::Exited(0), "", "")),
            Some(ScriptedReply::Output(output)) => Ok(output),
            Some(ScriptedReply::Hang) => futures::future::pending().await,
            Some(ScriptedReply::SpawnError) => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}: command not found", spec.program),
            )),
            Some(ScriptedReply::Handler(handler)) => handler(spec),
        }
    }
}
