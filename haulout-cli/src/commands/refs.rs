//! `haulout refs`: show the repositories a fork run would process.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use super::load_repo_refs;

/// Arguments for `haulout refs`.
#[derive(Args, Debug)]
pub struct RefsArgs {
    /// Harvest JSON file or text file of repository URLs.
    pub input: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct RefRow {
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "project")]
    project: String,
}

impl RefsArgs {
    pub fn run(self) -> Result<()> {
        let refs = load_repo_refs(&self.input)?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&refs)?);
            return Ok(());
        }

        if refs.is_empty() {
            println!("{}", "no GitHub repositories found".yellow());
            return Ok(());
        }

        let rows: Vec<RefRow> = refs
            .iter()
            .map(|r| RefRow {
                repository: r.full_name(),
                project: r.project_name.clone().unwrap_or_else(|| "-".to_string()),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("{} repositories", refs.len().to_string().bold());
        Ok(())
    }
}
