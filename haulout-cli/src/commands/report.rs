//! `haulout report`: summarize a saved fork report.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::{ColoredString, Colorize};
use tabled::{settings::Style, Table, Tabled};

use haulout_core::report::{load_ledger, REPORT_FILE};
use haulout_core::{ForkAction, ForkOutcome, Ledger};

/// Arguments for `haulout report`.
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Report file written by `haulout fork`.
    #[arg(default_value = REPORT_FILE)]
    pub file: PathBuf,

    /// Re-emit the report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "ok")]
    ok: String,
    #[tabled(rename = "message")]
    message: String,
}

impl ReportArgs {
    pub fn run(self) -> Result<()> {
        let ledger = load_ledger(&self.file)
            .with_context(|| format!("failed to read report {}", self.file.display()))?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&ledger)?);
            return Ok(());
        }

        if !ledger.is_empty() {
            let rows: Vec<OutcomeRow> = ledger
                .results
                .iter()
                .map(|o| OutcomeRow {
                    repository: format!("{}/{}", o.owner, o.name),
                    action: o.action.to_string(),
                    ok: if o.success { "yes" } else { "no" }.to_string(),
                    message: o.message.clone(),
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        print_summary(&ledger);
        Ok(())
    }
}

/// Aggregate counts, one per line.
pub fn print_summary(ledger: &Ledger) {
    println!("{}", "Summary".bold());
    println!("  total:      {}", ledger.total);
    println!("  successful: {}", ledger.successful.to_string().green());
    println!("  forked:     {}", ledger.forked);
    println!("  synced:     {}", ledger.synced);
    println!("  skipped:    {}", ledger.skipped);
    let failed = ledger.failed.to_string();
    if ledger.failed > 0 {
        println!("  failed:     {}", failed.red().bold());
    } else {
        println!("  failed:     {failed}");
    }
}

/// Short coloured tag for a progress line.
pub fn outcome_label(outcome: &ForkOutcome) -> ColoredString {
    match (outcome.action, outcome.success) {
        (_, false) => "failed".red(),
        (ForkAction::Fork, true) => "forked".green(),
        (ForkAction::Sync, true) => "synced".cyan(),
        (ForkAction::Skip, true) => "skipped".yellow(),
    }
}
