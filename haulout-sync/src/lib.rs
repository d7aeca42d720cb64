//! # haulout-sync
//!
//! Network side of haulout: a paginated harvester for the project listing
//! and a fork-or-sync orchestrator for GitHub, both running over one
//! rate-limited [`http::HttpClient`].
//!
//! Everything is sequential and blocking. Waits go through [`pace::Pace`] so
//! a [`pace::CancelToken`] can stop a run between requests, and tests can
//! record waits instead of sleeping (see [`testing`]).

pub mod error;
pub mod fork;
pub mod harvest;
pub mod http;
pub mod pace;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod testing;

pub use error::{ForkRunError, HarvestError, HttpError, SyncError};
pub use fork::{Orchestrator, RunOptions};
pub use harvest::{Harvest, Harvester, StopReason};
pub use http::{Credential, HttpClient, Transport, UreqTransport};
pub use pace::{CancelToken, Pace};
pub use progress::{ForkObserver, HarvestObserver, Silent};
