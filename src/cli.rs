use crate::engine::HttpAnalysisClient;
use crate::model::{ClientConfig, Session};
use crate::orchestrator::{IngestOutcome, Orchestrator, SendOutcome};
use crate::store::StoreHandle;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal, Write};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "gitoracle",
    version,
    about = "Chat with an AI analysis service about a GitHub repository"
)]
pub struct Cli {
    /// Base URL of the repository analysis service
    #[arg(long, env = "GITORACLE_BASE_URL", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Print the final conversation as JSON and exit (no TUI)
    #[arg(long, conflicts_with = "text")]
    pub json: bool,

    /// Print a plain-text transcript and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Repository to analyze (required with --text/--json; pre-fills the TUI otherwise)
    #[arg(long)]
    pub repo: Option<String>,

    /// Question to ask; repeatable. Without it, questions are read from stdin, one per line
    #[arg(long = "ask", value_name = "QUESTION")]
    pub ask: Vec<String>,

    /// Write the final conversation to this JSON file
    #[arg(long)]
    pub export_json: Option<std::path::PathBuf>,

    /// Give up on an ingestion after this long (e.g. 10m). No limit by default
    #[arg(long, env = "GITORACLE_INGEST_TIMEOUT")]
    pub ingest_timeout: Option<humantime::Duration>,

    /// Give up on a question after this long (e.g. 90s). No limit by default
    #[arg(long, env = "GITORACLE_QUERY_TIMEOUT")]
    pub query_timeout: Option<humantime::Duration>,

    /// Path to a custom TLS root certificate file (PEM or DER format)
    #[arg(long)]
    pub certificate: Option<std::path::PathBuf>,

    /// Log filter directive (e.g. info, gitoracle=debug)
    #[arg(long, env = "GITORACLE_LOG", default_value = "warn")]
    pub log_level: String,
}

impl Cli {
    pub fn is_interactive(&self) -> bool {
        !self.json && !self.text && cfg!(feature = "tui")
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_batch(args).await;
        }
    }

    run_batch(args).await
}

/// Build a `ClientConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> ClientConfig {
    ClientConfig {
        base_url: args.base_url.clone(),
        ingest_timeout: args.ingest_timeout.map(Into::into),
        query_timeout: args.query_timeout.map(Into::into),
        certificate_path: args.certificate.clone(),
        ..ClientConfig::default()
    }
}

/// Text and JSON modes: ingest `--repo`, ask every question in order, then print.
async fn run_batch(args: Cli) -> Result<()> {
    let repo = args
        .repo
        .clone()
        .context("--repo is required with --text or --json")?;
    let cfg = build_config(&args);
    let client = HttpAnalysisClient::new(&cfg)?;
    let orch = Orchestrator::new(client, StoreHandle::default(), &cfg);
    let (out_tx, out_handle) = spawn_output_writer();

    let _ = out_tx.send(OutputLine::Stderr(format!(
        "Analyzing {repo}… this may take a few minutes for large repositories"
    )));
    let session_id = match orch.ingest.ingest(&repo).await? {
        IngestOutcome::Created { session_id, label } => {
            let _ = out_tx.send(OutputLine::Stderr(format!("Ready: {label}")));
            session_id
        }
        IngestOutcome::Failed { reason } => {
            drop(out_tx);
            let _ = out_handle.await;
            anyhow::bail!(failure_line("ingestion failed", &reason));
        }
    };

    let questions = if args.ask.is_empty() {
        read_stdin_questions(&out_tx).await?
    } else {
        args.ask.clone()
    };

    let mut failures = 0usize;
    let mut printed = 0usize;
    if args.text {
        if let Some(session) = snapshot(&orch, session_id) {
            let header = crate::transcript::build_transcript(&session);
            for line in header.lines {
                let _ = out_tx.send(OutputLine::Stdout(line));
            }
        }
    }
    for question in questions.iter().filter(|q| !q.trim().is_empty()) {
        match orch.query.send(session_id, question).await? {
            SendOutcome::Answered { .. } => {}
            SendOutcome::Failed { reason } => {
                failures += 1;
                let _ = out_tx.send(OutputLine::Stderr(failure_line("Question failed", &reason)));
            }
        }
        if args.text {
            let Some(session) = snapshot(&orch, session_id) else {
                break;
            };
            for message in &session.messages[printed..] {
                let _ = out_tx.send(OutputLine::Stdout(String::new()));
                for line in crate::transcript::message_lines(message) {
                    let _ = out_tx.send(OutputLine::Stdout(line));
                }
            }
            printed = session.messages.len();
        }
    }

    let session = snapshot(&orch, session_id).context("conversation disappeared")?;
    if let Some(p) = args.export_json.as_deref() {
        crate::export::export_json(p, &session)?;
        let _ = out_tx.send(OutputLine::Stderr(format!("Exported: {}", p.display())));
    }
    if args.json {
        let out = serde_json::to_string_pretty(&session)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    }
    if failures > 0 {
        let _ = out_tx.send(OutputLine::Stderr(format!(
            "{failures} of {} questions failed",
            questions.iter().filter(|q| !q.trim().is_empty()).count()
        )));
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

/// Service-supplied failure text, made safe for the terminal.
fn failure_line(context: &str, reason: &str) -> String {
    format!("{context}: {}", crate::markdown::strip_controls(reason))
}

fn snapshot<S: crate::engine::AnalysisService>(
    orch: &Orchestrator<S>,
    session_id: Uuid,
) -> Option<Session> {
    orch.store().lock().session(session_id).cloned()
}

async fn read_stdin_questions(out_tx: &mpsc::UnboundedSender<OutputLine>) -> Result<Vec<String>> {
    if std::io::stdin().is_terminal() {
        let _ = out_tx.send(OutputLine::Stderr(
            "Enter one question per line, then Ctrl-D:".into(),
        ));
    }
    tokio::task::spawn_blocking(|| {
        std::io::stdin()
            .lock()
            .lines()
            .collect::<std::io::Result<Vec<String>>>()
    })
    .await
    .context("stdin reader task failed")?
    .context("read questions from stdin")
}
