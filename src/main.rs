use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use patch_bridge::batch::{outcome_feedback, BatchRequest};
use patch_bridge::config::{load_for_workspace, BridgeConfig};
use patch_bridge::logging::init_tracing;
use patch_bridge::{DryRunStore, Session, TerminalState, WorkspaceGuard, WorkspaceStore};
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const WORKSPACE_ENV: &str = "PATCH_BRIDGE_WORKSPACE";

#[derive(Parser)]
#[command(name = "patch-bridge")]
#[command(about = "HTTP bridge that applies YAML search/replace edits, lints and commits them", long_about = None)]
#[command(version)]
struct Cli {
    /// Workspace root (falls back to $PATCH_BRIDGE_WORKSPACE, then the current directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Config file (defaults to patch-bridge.toml in the workspace)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Never commit applied changes
    #[arg(long, global = true)]
    no_auto_commit: bool,

    /// Extra lint command, as "<ext>: <command>" or just "<command>" for all files
    #[arg(long = "lint-cmd", global = true)]
    lint_cmd: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Address to bind (default from config, then 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (default from config, then 5000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one YAML batch against the workspace and print the feedback
    Execute {
        /// YAML batch file
        file: PathBuf,

        /// Apply in memory only; nothing is written, linted or committed
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Print repository context as JSON
    Context,
}

fn main() -> Result<()> {
    init_tracing("info");
    let cli = Cli::parse();

    let workspace = resolve_workspace(cli.workspace.clone())?;
    let mut config = load_for_workspace(&workspace, cli.config.as_deref())?;
    apply_overrides(&mut config, &cli)?;

    match cli.command {
        Commands::Serve { host, port } => cmd_serve(&workspace, &config, host, port),
        Commands::Execute {
            file,
            dry_run,
            diff,
        } => cmd_execute(&workspace, &config, &file, dry_run, diff),
        Commands::Context => cmd_context(&workspace, &config),
    }
}

/// Priority order:
/// 1. Explicit --workspace flag
/// 2. PATCH_BRIDGE_WORKSPACE environment variable
/// 3. Current directory
fn resolve_workspace(cli_workspace: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_workspace {
        return path
            .canonicalize()
            .with_context(|| format!("workspace {} does not exist", path.display()));
    }

    if let Ok(env_path) = env::var(WORKSPACE_ENV) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!("Warning: {WORKSPACE_ENV} is set but path doesn't exist: {env_path}").yellow()
        );
    }

    Ok(env::current_dir()?.canonicalize()?)
}

fn apply_overrides(config: &mut BridgeConfig, cli: &Cli) -> Result<()> {
    if cli.no_auto_commit {
        config.edit.auto_commits = false;
    }
    for spec in &cli.lint_cmd {
        let Some((ext, command)) = parse_lint_cmd(spec) else {
            bail!("invalid --lint-cmd value: {spec:?}");
        };
        config.lint.commands.insert(ext, command.into());
    }
    Ok(())
}

/// `"py: flake8 --select=E9"` or `"make lint"` (any extension).
fn parse_lint_cmd(spec: &str) -> Option<(String, String)> {
    if let Some((ext, command)) = spec.split_once(':') {
        let ext = ext.trim();
        if !ext.is_empty() && !ext.contains(char::is_whitespace) && !command.trim().is_empty() {
            return Some((ext.to_string(), command.trim().to_string()));
        }
    }
    let command = spec.trim();
    (!command.is_empty()).then(|| ("*".to_string(), command.to_string()))
}

fn cmd_serve(
    workspace: &Path,
    config: &BridgeConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    let session = Session::open(workspace, config)?;
    println!("Workspace: {}", workspace.display());
    println!("Listening on {}", format!("http://{addr}").bold());

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(patch_bridge::server::serve(addr, session))?;
    Ok(())
}

fn cmd_execute(
    workspace: &Path,
    config: &BridgeConfig,
    file: &Path,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let yaml = fs::read_to_string(file)
        .with_context(|| format!("failed to read batch file {}", file.display()))?;
    let mut session = Session::open(workspace, config)?;

    let changes = match BatchRequest::parse(&yaml)? {
        BatchRequest::FilesNeeded(_) => {
            println!("{}", session.execute_yaml(&yaml)?);
            return Ok(());
        }
        BatchRequest::CodeChanges(changes) => changes,
    };

    if dry_run {
        println!("{}", "[DRY RUN - nothing will be written, linted or committed]".cyan());
        let store = DryRunStore::new(WorkspaceStore::new(WorkspaceGuard::new(workspace)?));
        session = session.with_store(store).without_linter().without_repository();
    }

    // Capture file contents before applying (for diff output)
    let mut before: BTreeMap<PathBuf, String> = BTreeMap::new();
    if show_diff {
        for change in &changes {
            let Some(name) = change.file.as_deref().filter(|name| !name.is_empty()) else {
                continue;
            };
            if let Ok(path) = session.store().resolve(Path::new(name)) {
                let text = session.store().read(&path).unwrap_or_default();
                before.entry(path).or_insert(text);
            }
        }
    }

    let result = session.execute(&changes);

    if show_diff {
        if let Ok(outcome) = &result {
            for file in &outcome.touched {
                let original = before.get(file).map(String::as_str).unwrap_or("");
                if let Ok(modified) = session.store().read(file) {
                    if original != modified {
                        display_diff(file, original, &modified);
                    }
                }
            }
            println!();
        }
    }

    let feedback = outcome_feedback(&result);
    let state = match &result {
        Ok(outcome) => outcome.terminal_state(),
        Err(err) => err.terminal_state(),
    };
    match state {
        TerminalState::Committed | TerminalState::Applied => println!("{}", feedback.green()),
        TerminalState::LintFailed => println!("{}", feedback.yellow()),
        TerminalState::ApplyFailed | TerminalState::ReadFailed => {
            eprintln!("{}", feedback.red());
            std::process::exit(1);
        }
    }
    Ok(())
}

fn cmd_context(workspace: &Path, config: &BridgeConfig) -> Result<()> {
    let session = Session::open(workspace, config)?;
    println!("{}", serde_json::to_string_pretty(&session.context())?);
    Ok(())
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!("\n{}", format!("--- {} (original)", file.display()).dimmed());
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}
