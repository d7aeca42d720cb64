//! haulout core library: domain types, configuration, report persistence.
//!
//! Public API surface:
//! - [`types`]: items, cursors, repository references, fork outcomes, ledger
//! - [`repo_ref`]: source URL normalization and reference extraction
//! - [`config`]: layered [`Config`] (defaults → YAML → environment)
//! - [`report`]: atomic JSON persistence for harvests and ledgers
//! - [`error`]: [`CoreError`]

pub mod config;
pub mod error;
pub mod report;
pub mod repo_ref;
pub mod types;

pub use config::{Config, ForkRetryConfig, GitHubConfig, ListingConfig, PAGE_SIZE};
pub use error::CoreError;
pub use types::{Cursor, ForkAction, ForkOutcome, Item, ItemId, Ledger, RepoRef};
