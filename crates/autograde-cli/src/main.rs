//! autograde - grade one Java submission and print its result document
//!
//! Clones the submission, detects its build tool, compiles it, runs its
//! tests and writes a single JSON result to stdout. The process exit code
//! mirrors the result: 0 completed, 1 failed, 2 compilation failure,
//! 130 interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};

use autograde_ci::{GradingSession, SessionOptions, SystemCommandRunner};
use autograde_core::{JobConfig, JobResult};

#[derive(Parser, Debug)]
#[command(name = "autograde")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build and test a graded Java submission", long_about = None)]
struct Cli {
    /// Job identifier echoed in the result (numeric)
    #[arg(long, env = "JOB_ID")]
    job_id: Option<String>,

    /// Git URL or local path of the submission
    #[arg(long, env = "REPO_URL")]
    repo_url: Option<String>,

    /// Commit, tag or branch to grade (default branch when omitted, "HEAD" or "latest")
    #[arg(long, env = "COMMIT_HASH")]
    revision: Option<String>,

    /// Overall job timeout in seconds
    #[arg(long, env = "TIMEOUT")]
    timeout: Option<String>,

    /// Parent directory for per-job working directories
    #[arg(long, env = "AUTOGRADE_WORKDIR")]
    workdir: Option<PathBuf>,

    /// Keep the working directory after the job for inspection
    #[arg(long)]
    keep_workdir: bool,

    /// Also write the result document to this file
    #[arg(long)]
    result_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn job_config(&self) -> JobConfig {
        JobConfig {
            job_id: self.job_id.clone(),
            repo_url: self.repo_url.clone(),
            revision: self.revision.clone(),
            timeout_secs: self.timeout.clone(),
        }
    }

    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            workdir: self.workdir.clone(),
            keep_workdir: self.keep_workdir,
            ..SessionOptions::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    autograde_core::init_tracing(cli.json_logs, level);

    let session = GradingSession::new(SystemCommandRunner, cli.session_options());
    let result = session.run(&cli.job_config(), shutdown_signal()).await;

    emit(&result, &mut std::io::stdout().lock(), cli.result_file.as_deref())?;
    std::process::exit(result.exit_code);
}

/// Write the result to `out` (stdout in production) and optionally persist it.
fn emit(result: &JobResult, out: &mut impl Write, result_file: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(result).context("Failed to serialize job result")?;

    writeln!(out, "{json}").context("Failed to write job result")?;
    out.flush().context("Failed to flush job result")?;

    if let Some(path) = result_file {
        match std::fs::write(path, &json) {
            Ok(()) => info!(path = %path.display(), "Result written"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to write result file"),
        }
    }
    Ok(())
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
