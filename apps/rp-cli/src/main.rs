//! # rp-cli
//!
//! Command-line host for proposal review.
//!
//! - `rp review show` — render a proposal against the current entity store
//! - `rp review apply` — replay reviewer choices, accept, and execute
//! - `rp review reject` — record a rejection

mod commands;
mod store;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Research-pipeline proposal review.
#[derive(Parser)]
#[command(name = "rp", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Review, apply, or reject a proposal.
    Review {
        #[command(subcommand)]
        command: commands::review::ReviewCommands,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the review and progress output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("rp_proposal=info".parse()?)
                .add_directive("rp_execution=info".parse()?)
                .add_directive("rp_cli=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);

    match &cli.command {
        Commands::Review { command } => commands::review::execute(command, &project_root),
    }
}
