//! Conduit CLI - command-line interface for the Conduit task orchestrator
//!
//! This CLI provides a `conduit` command for validating and running task graphs
//! and for inspecting model selection and canary rollout.

mod commands;
mod config;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{CanaryCommand, SelectArgs, canary, run, select, validate};
use config::CliConfig;

/// Environment variable consulted for the log level.
const LOG_ENV: &str = "CONDUIT_LOG";

/// Conduit CLI - dependency-graph task orchestration
///
/// Conduit validates task graphs, drives them through registered agents and picks
/// backing models with deterministic canary rollout.
#[derive(Parser, Debug)]
#[command(
    name = "conduit",
    author,
    version,
    about = "Conduit - dependency-graph task orchestration",
    long_about = None
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Configuration file (defaults to ./conduit.toml, then ~/.conduit/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a task graph
    ///
    /// Checks ids, dependency references and acyclicity, and prints the execution
    /// rounds of a valid graph.
    Validate {
        /// Path to the task graph JSON file
        graph: PathBuf,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute a task graph
    ///
    /// Submits the graph, reports progress until the job finishes and prints the
    /// per-task results. Ctrl-C cancels the job.
    Run {
        /// Path to the task graph JSON file
        graph: PathBuf,

        /// Output the final job record as JSON
        #[arg(long)]
        json: bool,

        /// Progress polling interval in milliseconds
        #[arg(long, default_value_t = 100)]
        poll_ms: u64,
    },

    /// Select a model for a role
    Select(SelectArgs),

    /// Inspect canary rollout
    #[command(subcommand)]
    Canary(CanaryCommand),
}

fn parse_level(value: &str) -> Level {
    match value.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (cli_config, config_path) = CliConfig::discover(args.config.as_deref())?;

    // Initialize tracing: flag, then environment, then config file
    let level = args
        .log_level
        .clone()
        .or_else(|| std::env::var(LOG_ENV).ok())
        .or_else(|| cli_config.log_level.clone())
        .map_or(Level::WARN, |value| parse_level(&value));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(path) = &config_path {
        tracing::debug!(path = %path.display(), "Loaded configuration");
    }

    // If no command provided, show help
    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    match command {
        Command::Validate { graph, json } => {
            validate::execute(&graph, json)?;
        }
        Command::Run { graph, json, poll_ms } => {
            run::execute(&cli_config, &graph, json, poll_ms).await?;
        }
        Command::Select(select_args) => {
            select::execute(&cli_config, select_args).await?;
        }
        Command::Canary(cmd) => {
            canary::execute(&cli_config, cmd)?;
        }
    }

    Ok(())
}
