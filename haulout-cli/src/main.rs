//! haulout: harvest hackathon projects and mirror their repositories.
//!
//! # Usage
//!
//! ```text
//! haulout harvest [--pages N | --all] [--output FILE] [--keep-partial]
//!                 [--endpoint URL] [--collection ID]
//! haulout refs <INPUT> [--json]
//! haulout fork <INPUT> [--org ORG] [--no-sync] [--delay-secs N] [--report FILE]
//! haulout report [FILE] [--json]
//! ```
//!
//! `--config FILE` and `--verbose` are accepted by every subcommand. Logs go
//! to stderr; stdout carries only results.

mod commands;
mod shutdown;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use commands::{fork::ForkArgs, harvest::HarvestArgs, refs::RefsArgs, report::ReportArgs};
use haulout_core::Config;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "haulout",
    version,
    about = "Harvest a hackathon project listing and fork its repositories into an organization",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// YAML config file (default: ~/.haulout/config.yaml when present).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG takes precedence).
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Defaults, then the YAML file, then the environment.
    pub fn load_config(&self) -> Result<Config> {
        Config::load(self.config.as_deref()).context("failed to load configuration")
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk the project listing and write every project to a JSON file.
    Harvest(HarvestArgs),

    /// List the GitHub repositories referenced by a harvest or URL list.
    Refs(RefsArgs),

    /// Fork (or sync) every referenced repository into the target org.
    Fork(ForkArgs),

    /// Summarize a saved fork report.
    Report(ReportArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match cli.command {
        Commands::Harvest(args) => args.run(&cli.global),
        Commands::Refs(args) => args.run(),
        Commands::Fork(args) => args.run(&cli.global),
        Commands::Report(args) => args.run(),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
