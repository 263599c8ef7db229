use crate::api::HealClient;
use crate::auth::{
    CallbackOutcome, CredentialManager, CredentialStore, FileStore, Location, MemoryLocation,
    MemoryStore,
};
use crate::config::{ClientConfig, DEFAULT_BASE_URL};
use crate::error::RunError;
use crate::model::{RunResponse, SessionEvent};
use crate::orchestrator::{process_run_completion, run_controller, UiCommand};
use crate::outcome::Outcome;
use crate::request::RunForm;
use crate::session::RunSession;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
    /// Rewrite the single status line on stderr.
    Status(String),
    ClearStatus,
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
///
/// Status lines are only drawn when `status_line` is set; otherwise they are dropped.
fn spawn_output_writer(
    status_line: bool,
) -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());
        let mut status_shown = false;

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    if status_shown {
                        clear_status(&mut err);
                        status_shown = false;
                    }
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    if status_shown {
                        clear_status(&mut err);
                        status_shown = false;
                    }
                    let _ = writeln!(err, "{}", msg);
                }
                OutputLine::Status(msg) if status_line => {
                    let _ = crossterm::queue!(
                        err,
                        MoveToColumn(0),
                        Clear(ClearType::CurrentLine),
                        Print(format!("  {msg}"))
                    );
                    let _ = err.flush();
                    status_shown = true;
                }
                OutputLine::Status(_) => {}
                OutputLine::ClearStatus => {
                    if status_shown {
                        clear_status(&mut err);
                        status_shown = false;
                    }
                }
            }
        }

        if status_shown {
            clear_status(&mut err);
        }
        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

fn clear_status(err: &mut impl Write) {
    let _ = crossterm::queue!(err, MoveToColumn(0), Clear(ClearType::CurrentLine));
    let _ = err.flush();
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "heal-client",
    version,
    about = "Submit repositories to the CI healing agent and review what it did"
)]
pub struct Cli {
    /// Base URL of the healing agent; the run API lives under `/api`
    #[arg(long, env = "HEAL_API_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub base_url: String,

    /// Backend serving `/auth/login` and `/health` (defaults to --base-url)
    #[arg(long, env = "HEAL_BACKEND_URL", global = true)]
    pub backend_url: Option<String>,

    /// How often the progress label advances while a run is outstanding
    #[arg(long, default_value = "2s", global = true)]
    pub narrator_interval: humantime::Duration,

    /// Give up on the run request after this long (no limit by default)
    #[arg(long, global = true)]
    pub timeout: Option<humantime::Duration>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Submit a repository and wait for the agent's result
    Run(RunArgs),
    /// Manage the stored GitHub credential
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Check that the backend is reachable
    Check,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Repository URL, e.g. https://github.com/org/repo
    #[arg(long)]
    pub repo: String,

    /// Team name
    #[arg(long)]
    pub team: String,

    /// Team leader name
    #[arg(long)]
    pub leader: String,

    /// GitHub token for this run only; overrides the stored one
    #[arg(long, env = "HEAL_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Print the JSON result instead of the text report
    #[arg(long)]
    pub json: bool,

    /// Also write the JSON result to this file
    #[arg(long)]
    pub export_json: Option<PathBuf>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum AuthAction {
    /// Print the address to open for GitHub authorization
    Login,
    /// Finish authorization with the address (or `#token=...` fragment) you were redirected to
    Callback { address: String },
    /// Store a personal access token directly
    Token { token: String },
    /// Forget the stored token
    Logout,
    /// Show whether a token is stored
    Status,
}

/// Run the selected command and return the process exit code.
pub async fn run(args: Cli) -> Result<i32> {
    let cfg = build_config(&args);
    match args.command {
        Command::Run(run) => run_submit(cfg, run).await,
        Command::Auth { action } => run_auth(&cfg, action),
        Command::Check => run_check(&cfg).await,
    }
}

/// Build a `ClientConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> ClientConfig {
    let mut cfg = ClientConfig::new(&args.base_url, args.backend_url.as_deref());
    cfg.narrator_interval = args.narrator_interval.into();
    cfg.request_timeout = args.timeout.map(Into::into);
    cfg
}

/// Credential file under the config directory, or a process-local slot when
/// there is no usable config directory.
fn open_store() -> Arc<dyn CredentialStore> {
    match FileStore::default_path() {
        Ok(path) => Arc::new(FileStore::new(path)),
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "no credentials file; token will not persist");
            Arc::new(MemoryStore::new())
        }
    }
}

fn credential_manager(cfg: &ClientConfig) -> CredentialManager<Arc<dyn CredentialStore>> {
    let mut credentials = CredentialManager::new(open_store(), cfg.login_url());
    credentials.initialize();
    credentials
}

async fn run_submit(cfg: ClientConfig, args: RunArgs) -> Result<i32> {
    let request = RunForm {
        repo_url: args.repo.clone(),
        team_name: args.team.clone(),
        team_leader_name: args.leader.clone(),
        github_token: args.github_token.clone(),
    }
    .build()?;

    let session = RunSession::new(HealClient::new(&cfg)?);
    let credentials = credential_manager(&cfg);

    let (out_tx, out_handle) = spawn_output_writer(!args.json && std::io::stderr().is_terminal());
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let controller = tokio::spawn(run_controller(session, credentials, event_tx, cmd_rx));

    let _ = cmd_tx.send(UiCommand::Submit(request));

    let settled: Option<Result<RunResponse, RunError>> = loop {
        tokio::select! {
            ev = event_rx.recv() => {
                match ev {
                    Some(SessionEvent::Submitting { generation }) => {
                        let _ = out_tx.send(OutputLine::Stderr(format!(
                            "Run #{generation} submitted to {}",
                            cfg.run_url()
                        )));
                    }
                    Some(SessionEvent::Phase { label, .. }) => {
                        let _ = out_tx.send(OutputLine::Status(format!("{label}…")));
                    }
                    Some(SessionEvent::Info(info)) => {
                        let _ = out_tx.send(OutputLine::Stderr(info.to_message()));
                    }
                    Some(SessionEvent::Completed { response, .. }) => break Some(Ok(*response)),
                    Some(SessionEvent::Failed { error, .. }) => break Some(Err(error)),
                    None => break None,
                }
            }
            _ = tokio::signal::ctrl_c() => break None,
        }
    };

    let _ = cmd_tx.send(UiCommand::Quit);
    let _ = out_tx.send(OutputLine::ClearStatus);
    controller.await.context("run controller task failed")??;

    let Some(settled) = settled else {
        let _ = out_tx.send(OutputLine::Stderr(
            "Interrupted; the agent may still be working on the repository.".into(),
        ));
        drop(out_tx);
        let _ = out_handle.await;
        return Ok(130);
    };

    let (response, error) = match settled {
        Ok(r) => {
            let embedded = r.embedded_error().map(|e| RunError::Embedded(e.to_string()));
            (Some(r), embedded)
        }
        Err(e) => (None, Some(e)),
    };

    let processed =
        process_run_completion(args.export_json.as_deref(), response.as_ref(), error.as_ref());
    for msg in &processed.export_messages {
        let _ = out_tx.send(OutputLine::Stderr(msg.clone()));
    }

    if args.json {
        match (&response, &error) {
            (Some(r), _) => {
                let out = serde_json::to_string_pretty(r)?;
                let _ = out_tx.send(OutputLine::Stdout(out));
            }
            (None, Some(e)) => {
                let _ = out_tx.send(OutputLine::Stderr(format!("Error: {e}")));
            }
            (None, None) => {}
        }
    } else {
        let summary = crate::text_summary::build_text_summary(
            response.as_ref(),
            error.as_ref(),
            processed.outcome,
            processed.reauthorize,
            crate::metrics::local_offset(),
        );
        for line in summary.lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }

    drop(out_tx);
    let _ = out_handle.await;

    Ok(exit_code(processed.outcome))
}

/// Process exit status for a settled run: only an Error outcome fails.
fn exit_code(outcome: Outcome) -> i32 {
    match outcome {
        Outcome::Error => 1,
        Outcome::Success | Outcome::PartialFix | Outcome::Unfixed => 0,
    }
}

/// Location for a terminal: "navigating" means telling the operator where to go.
struct ConsoleLocation;

impl Location for ConsoleLocation {
    fn navigate(&mut self, url: &str) {
        println!("Open this address in your browser to authorize GitHub access:");
        println!("  {url}");
        println!();
        println!("When the browser is redirected, copy the full address and run:");
        println!("  heal-client auth callback '<address>'");
    }

    fn fragment(&self) -> Option<String> {
        None
    }

    fn clear_fragment(&mut self) {}
}

fn run_auth(cfg: &ClientConfig, action: AuthAction) -> Result<i32> {
    let mut credentials = credential_manager(cfg);
    match action {
        AuthAction::Login => {
            credentials.begin_acquisition(&mut ConsoleLocation);
            Ok(0)
        }
        AuthAction::Callback { address } => {
            let mut location = MemoryLocation::with_fragment(&address);
            match credentials.complete_from_location(&mut location) {
                Some(CallbackOutcome::Stored) => {
                    println!("Signed in. The token will be used for future runs.");
                    Ok(0)
                }
                Some(CallbackOutcome::Rejected(e)) => {
                    eprintln!("Authorization failed: {e}");
                    Ok(1)
                }
                Some(CallbackOutcome::Ignored) | None => {
                    eprintln!("No token or error found in the callback address.");
                    Ok(1)
                }
            }
        }
        AuthAction::Token { token } => {
            let token = token.trim();
            if token.is_empty() {
                anyhow::bail!("token must not be empty");
            }
            credentials.set_credential(token);
            println!("Token stored.");
            Ok(0)
        }
        AuthAction::Logout => {
            credentials.sign_out();
            println!("Signed out.");
            Ok(0)
        }
        AuthAction::Status => {
            if credentials.is_authenticated() {
                println!("Signed in with a stored GitHub token.");
            } else {
                println!("Not signed in. Runs will use the agent's own token.");
            }
            Ok(0)
        }
    }
}

async fn run_check(cfg: &ClientConfig) -> Result<i32> {
    let client = HealClient::new(cfg)?;
    let health = client.health().await?;
    println!("Backend: {}", cfg.backend_base);
    println!("Status: {}", health.status);
    if let Some(v) = health.backend_version.as_deref() {
        println!("Version: {v}");
    }
    if let Some(llm) = health.llm_required {
        println!("LLM required: {llm}");
    }
    Ok(if health.status == "ok" { 0 } else { 1 })
}
