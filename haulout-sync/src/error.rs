//! Error types for haulout-sync.

use thiserror::Error;

use haulout_core::{CoreError, Item, Ledger};

/// Failure to complete one HTTP exchange, or to make sense of its result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// The hard per-call timeout elapsed.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Connection refused/reset, DNS failure, truncated body.
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// The server answered with a status the caller cannot use.
    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    /// A 2xx body that does not have the expected shape.
    #[error("unexpected response body from {url}: {message}")]
    Decode { url: String, message: String },

    /// The request can never succeed as built (bad URL, unsupported scheme).
    #[error("request to {url} cannot be sent: {message}")]
    Fatal { url: String, message: String },
}

impl HttpError {
    /// Whether a later identical attempt could succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, HttpError::Fatal { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Timeout { .. })
    }
}

/// A harvest that did not run to a termination condition.
///
/// Both variants carry the items accumulated before the failure, in
/// discovery order, so the caller can decide whether to keep them.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("page {page} failed after retry: {source}")]
    PageFailed {
        page: usize,
        #[source]
        source: HttpError,
        partial: Vec<Item>,
    },

    #[error("harvest cancelled after {} item(s)", .partial.len())]
    Cancelled { partial: Vec<Item> },
}

impl HarvestError {
    pub fn partial(&self) -> &[Item] {
        match self {
            HarvestError::PageFailed { partial, .. } | HarvestError::Cancelled { partial } => {
                partial
            }
        }
    }

    pub fn into_partial(self) -> Vec<Item> {
        match self {
            HarvestError::PageFailed { partial, .. } | HarvestError::Cancelled { partial } => {
                partial
            }
        }
    }
}

/// A fork run that stopped before processing every repository.
#[derive(Debug, Error)]
pub enum ForkRunError {
    /// Cancelled between or during items. `ledger` holds every outcome
    /// completed so far and is a valid report on its own.
    #[error("fork run cancelled after {} of {submitted} repositories", .ledger.total)]
    Cancelled { ledger: Ledger, submitted: usize },
}

impl ForkRunError {
    pub fn into_ledger(self) -> Ledger {
        match self {
            ForkRunError::Cancelled { ledger, .. } => ledger,
        }
    }
}

/// Errors from the pipeline entrypoints, which also touch the filesystem.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Harvest(#[from] HarvestError),

    #[error(transparent)]
    ForkRun(#[from] ForkRunError),
}
