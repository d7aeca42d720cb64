//! Domain types shared by the harvester and the fork orchestrator.
//!
//! Everything here is plain data: serializable with serde, no I/O.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identity of a harvested item. Unique within one harvest session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque, server-issued continuation token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor(pub String);

impl Cursor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// A harvested record: an identity plus whatever attributes the listing
/// returned alongside it (track, status, links, counters, timestamps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Item {
    /// Build an item from a raw listing entry.
    ///
    /// Returns `None` when the entry is not an object or carries no usable
    /// `id` (missing, null, empty, or a non-scalar value). Numeric ids are
    /// kept in their decimal string form.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut attributes) = value else {
            return None;
        };
        let id = match attributes.remove("id")? {
            Value::String(s) if !s.trim().is_empty() => s,
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(Self {
            id: ItemId(id),
            attributes,
        })
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Display name of the project this item describes, if any.
    pub fn project_name(&self) -> Option<&str> {
        self.attributes.get("projectName").and_then(Value::as_str)
    }

    /// URL of the first entry in `links` whose `type` equals `kind`
    /// (e.g. `"github"`, `"website"`, `"youtube"`).
    pub fn link(&self, kind: &str) -> Option<&str> {
        self.attributes
            .get("links")?
            .as_array()?
            .iter()
            .find(|link| link.get("type").and_then(Value::as_str) == Some(kind))
            .and_then(|link| link.get("url"))
            .and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Repository references
// ---------------------------------------------------------------------------

/// A normalized `(owner, name)` repository reference.
///
/// `project_name` and `source_url` are provenance only; identity is
/// [`RepoRef::key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            project_name: None,
            source_url: None,
        }
    }

    #[must_use]
    pub fn with_project_name(mut self, project_name: Option<String>) -> Self {
        self.project_name = project_name;
        self
    }

    /// Case-insensitive identity used for deduplication. GitHub treats
    /// owner and repository names case-insensitively.
    pub fn key(&self) -> (String, String) {
        (self.owner.to_lowercase(), self.name.to_lowercase())
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

// ---------------------------------------------------------------------------
// Fork outcomes and the ledger
// ---------------------------------------------------------------------------

/// Which branch the orchestrator took for one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkAction {
    Fork,
    Sync,
    Skip,
}

impl fmt::Display for ForkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForkAction::Fork => write!(f, "fork"),
            ForkAction::Sync => write!(f, "sync"),
            ForkAction::Skip => write!(f, "skip"),
        }
    }
}

/// One ledger record. Field names are part of the persisted report format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    pub owner: String,
    #[serde(rename = "repo")]
    pub name: String,
    pub action: ForkAction,
    pub success: bool,
    pub message: String,
}

impl ForkOutcome {
    pub fn new(
        repo: &RepoRef,
        action: ForkAction,
        success: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            project_name: repo.project_name.clone(),
            github_url: repo.source_url.clone(),
            owner: repo.owner.clone(),
            name: repo.name.clone(),
            action,
            success,
            message: message.into(),
        }
    }
}

/// Ordered per-repository outcomes plus aggregate counts for one run.
///
/// Counts are maintained by [`Ledger::record`] so that
/// `total == results.len()` and `total == successful + failed` always hold.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ledger {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub synced: usize,
    pub forked: usize,
    #[serde(default)]
    pub results: Vec<ForkOutcome>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outcome and update the aggregate counts.
    pub fn record(&mut self, outcome: ForkOutcome) {
        self.total += 1;
        match (outcome.action, outcome.success) {
            (_, false) => self.failed += 1,
            (ForkAction::Fork, true) => {
                self.successful += 1;
                self.forked += 1;
            }
            (ForkAction::Sync, true) => {
                self.successful += 1;
                self.synced += 1;
            }
            (ForkAction::Skip, true) => {
                self.successful += 1;
                self.skipped += 1;
            }
        }
        self.results.push(outcome);
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
