//! `haulout harvest`: walk the project listing into a JSON file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use haulout_core::report::HARVEST_FILE;
use haulout_sync::{pipeline, CancelToken, Pace, UreqTransport};

use crate::shutdown;
use crate::GlobalArgs;

/// Page limit used by `--all`.
const ALL_PAGES: usize = 1000;

/// Arguments for `haulout harvest`.
#[derive(Args, Debug)]
pub struct HarvestArgs {
    /// Maximum number of pages to fetch (default from config, 50).
    #[arg(long, value_name = "N", conflicts_with = "all")]
    pub pages: Option<usize>,

    /// Fetch until the listing is exhausted (up to 1000 pages).
    #[arg(long)]
    pub all: bool,

    /// Output file for the harvested items.
    #[arg(long, short, default_value = HARVEST_FILE)]
    pub output: PathBuf,

    /// Write the items collected so far when a page fails.
    #[arg(long)]
    pub keep_partial: bool,

    /// Listing endpoint URL.
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Collection (hackathon) identifier.
    #[arg(long, value_name = "ID")]
    pub collection: Option<String>,
}

impl HarvestArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let mut config = global.load_config()?;
        if let Some(endpoint) = self.endpoint {
            config.listing.endpoint = endpoint;
        }
        if let Some(collection) = self.collection {
            config.listing.collection_id = collection;
        }
        let page_limit = if self.all {
            ALL_PAGES
        } else {
            self.pages.unwrap_or(config.listing.page_limit)
        };

        let cancel = CancelToken::new();
        shutdown::install(cancel.clone());

        let mut on_page = |page: usize, total: usize| {
            eprintln!("  {} page {page}: {total} projects so far", "›".dimmed());
        };
        let harvest = pipeline::harvest_to_file(
            &config,
            page_limit,
            &self.output,
            self.keep_partial,
            Arc::new(UreqTransport::new()),
            Pace::real(cancel),
            &mut on_page,
        )
        .with_context(|| format!("harvest into {} did not complete", self.output.display()))?;

        println!(
            "{} {} projects from {} page(s) ({}) → {}",
            "harvested".green().bold(),
            harvest.items.len(),
            harvest.pages_fetched,
            harvest.stop,
            self.output.display()
        );
        Ok(())
    }
}
