//! Steward CLI — terminal interface for the Steward agent.
//!
//! Provides both single-task and interactive REPL modes.

mod repl;
mod slash;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Steward: a safety-gated CLI agent
#[derive(Parser, Debug)]
#[command(name = "steward", version, about, long_about = None)]
struct Cli {
    /// Task to execute (starts interactive mode if omitted)
    task: Option<String>,

    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Execute independent plan steps in parallel batches
    #[arg(long)]
    parallel: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut config = steward_core::config::load_config(Some(&workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if cli.parallel {
        config.engine.parallel = true;
    }

    let mut repl = repl::Repl::new(config, workspace)?;
    match cli.task {
        Some(task) => repl.run_single(&task).await,
        None => repl.run().await,
    }
}
