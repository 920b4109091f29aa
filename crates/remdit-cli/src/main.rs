//! remdit CLI
//!
//! Command-line interface for remdit - share a local file for remote editing.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use remdit_core::{Config, SessionError};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "remdit")]
#[command(about = "remdit - Edit a local file from anywhere through a shareable link")]
#[command(version)]
#[command(propagate_version = true)]
#[command(subcommand_negates_reqs = true)]
struct Cli {
    /// File to share
    #[arg(required = true)]
    file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - print only the edit URL
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    match run(cli, &output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(hint) = e.downcast_ref::<SessionError>().and_then(SessionError::hint) {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).map_err(SessionError::from)?;
    init_logging(cli.verbose, config.log_file.as_deref())?;

    match (cli.command, cli.file) {
        (Some(Commands::Config), _) => commands::config::show(&config, output),
        (None, Some(file)) => commands::edit::run(&file, &config, output).await,
        (None, None) => anyhow::bail!("No file given. Run `remdit --help` for usage."),
    }
}

/// Initialize logging to stderr, or to `log_file` when configured
///
/// Level is `info` (`debug` with `--verbose`); `REMDIT_LOG` overrides it.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let log_level = std::env::var("REMDIT_LOG")
        .ok()
        .filter(|level| !level.is_empty())
        .unwrap_or_else(|| if verbose { "debug" } else { "info" }.to_string());

    let env_filter = EnvFilter::try_new(format!("remdit_core={},remdit={}", log_level, log_level))
        .with_context(|| format!("Invalid log level '{}'", log_level))?;

    let result = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Could not open log file {}", path.display()))?;

            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .try_init(),
    };

    // Already initialized is fine
    let _ = result;
    Ok(())
}
