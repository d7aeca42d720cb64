//! `haulout fork`: fork or sync every referenced repository.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use haulout_core::report::REPORT_FILE;
use haulout_core::ForkOutcome;
use haulout_sync::{pipeline, CancelToken, Pace, RunOptions, UreqTransport};

use super::load_repo_refs;
use super::report::{outcome_label, print_summary};
use crate::shutdown;
use crate::GlobalArgs;

/// Arguments for `haulout fork`.
#[derive(Args, Debug)]
pub struct ForkArgs {
    /// Harvest JSON file or text file of repository URLs.
    pub input: PathBuf,

    /// Organization receiving the forks.
    #[arg(long, env = "TARGET_ORG")]
    pub org: Option<String>,

    /// Skip existing forks instead of syncing them with upstream.
    #[arg(long)]
    pub no_sync: bool,

    /// Pause between repositories, in seconds.
    #[arg(long, value_name = "N")]
    pub delay_secs: Option<u64>,

    /// Where to write the fork report.
    #[arg(long, default_value = REPORT_FILE)]
    pub report: PathBuf,
}

impl ForkArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let repos = load_repo_refs(&self.input)?;
        if repos.is_empty() {
            println!("{}", "no GitHub repositories to process".yellow());
            return Ok(());
        }
        if config.github.token.is_none() {
            tracing::warn!("no FORK_TOKEN or GITHUB_TOKEN set; GitHub will reject fork requests");
        }

        let mut options = RunOptions::from_config(&config.github);
        if let Some(org) = self.org {
            options.target_org = org;
        }
        if self.no_sync {
            options.sync_existing = false;
        }
        if let Some(secs) = self.delay_secs {
            options.item_delay = Duration::from_secs(secs);
        }

        let cancel = CancelToken::new();
        shutdown::install(cancel.clone());

        let mut on_item = |position: usize, total: usize, outcome: &ForkOutcome| {
            println!(
                "[{position}/{total}] {} {}/{}: {}",
                outcome_label(outcome),
                outcome.owner,
                outcome.name,
                outcome.message
            );
        };
        let ledger = pipeline::fork_to_report(
            &config,
            &repos,
            &options,
            &self.report,
            Arc::new(UreqTransport::new()),
            Pace::real(cancel),
            &mut on_item,
        )
        .with_context(|| {
            format!("fork run stopped early; partial report in {}", self.report.display())
        })?;

        println!();
        print_summary(&ledger);
        println!("report written to {}", self.report.display());
        Ok(())
    }
}
