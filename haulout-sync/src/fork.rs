//! Fork-or-sync orchestrator.
//!
//! For every repository, in input order:
//!
//! 1. Look up `<org>/<name>`. Missing → fork. A verified fork of
//!    `<owner>/<name>` → sync (or skip when syncing is disabled). Anything
//!    else at that name → skip; foreign repositories are never touched. A
//!    failed lookup falls through to the fork path.
//! 2. Fork with bounded retries: `Retry-After` and "submitted too quickly"
//!    rejections wait as directed, other failures back off exponentially.
//!    404 is permanent; "already exists" counts as success.
//! 3. Sync through `merge-upstream` on `main`, falling back to `master`
//!    once. A failed sync is recorded as a successful skip: the fork exists.
//!
//! Exactly one [`ForkOutcome`] is appended per input reference, in order.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use haulout_core::{ForkAction, ForkOutcome, ForkRetryConfig, GitHubConfig, Ledger, RepoRef};

use crate::error::{ForkRunError, HttpError};
use crate::http::{HttpClient, Method, Response};
use crate::pace::Pace;
use crate::progress::ForkObserver;
use crate::retry::{retry, Attempt, RetryError, RetryPolicy, Wait};

/// Per-run parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub target_org: String,
    pub sync_existing: bool,
    /// Pause between repositories (none after the last).
    pub item_delay: Duration,
}

impl RunOptions {
    pub fn from_config(github: &GitHubConfig) -> Self {
        Self {
            target_org: github.target_org.clone(),
            sync_existing: github.sync_existing,
            item_delay: github.item_delay,
        }
    }
}

/// What the lookup found at `<org>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Existing {
    Missing,
    VerifiedFork,
    Foreign,
    /// The lookup itself failed; treated like `Missing`.
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct RepoLookup {
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    source: Option<RepoSource>,
}

#[derive(Debug, Deserialize)]
struct RepoSource {
    name: String,
    owner: RepoOwner,
}

#[derive(Debug, Deserialize)]
struct RepoOwner {
    login: String,
}

/// Classification of one fork response.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ForkReply {
    Created,
    AlreadyExists,
    Permanent(String),
    Retry(Wait, String),
}

/// Classification of one merge-upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MergeReply {
    Merged,
    UpToDate,
    /// 422: the branch does not exist on the fork.
    WrongBranch,
    Conflict(String),
    Failed(String),
}

const PRIMARY_BRANCH: &str = "main";
const FALLBACK_BRANCH: &str = "master";

/// Drives forks and syncs against the GitHub REST API.
#[derive(Debug)]
pub struct Orchestrator<'a> {
    lookup: HttpClient,
    mutate: HttpClient,
    github: &'a GitHubConfig,
    pace: Pace,
}

impl<'a> Orchestrator<'a> {
    /// `client` should carry the identification header and token; the
    /// lookup and mutation timeouts from `github` are applied here.
    pub fn new(client: HttpClient, github: &'a GitHubConfig, pace: Pace) -> Self {
        let client = client.with_header("Accept", "application/vnd.github.v3+json");
        Self {
            lookup: client.with_timeout(github.lookup_timeout),
            mutate: client.with_timeout(github.mutation_timeout),
            github,
            pace,
        }
    }

    /// Process `repos` sequentially and return the ledger.
    ///
    /// On cancellation the error carries the ledger of every completed
    /// repository.
    pub fn run(
        &self,
        repos: &[RepoRef],
        options: &RunOptions,
        observer: &mut dyn ForkObserver,
    ) -> Result<Ledger, ForkRunError> {
        let total = repos.len();
        let mut ledger = Ledger::new();
        tracing::info!(
            total,
            org = %options.target_org,
            sync_existing = options.sync_existing,
            "starting fork run"
        );

        for (index, repo) in repos.iter().enumerate() {
            if self.pace.is_cancelled() {
                return Err(ForkRunError::Cancelled {
                    ledger,
                    submitted: total,
                });
            }

            let position = index + 1;
            tracing::info!(position, total, owner = %repo.owner, repo = %repo.name, "processing");
            let Some(outcome) = self.process(repo, options) else {
                tracing::warn!(
                    owner = %repo.owner,
                    repo = %repo.name,
                    "cancelled mid-item; not recorded"
                );
                return Err(ForkRunError::Cancelled {
                    ledger,
                    submitted: total,
                });
            };

            log_outcome(&outcome);
            ledger.record(outcome);
            if let Some(last) = ledger.results.last() {
                observer.item_done(position, total, last);
            }

            if position < total && !self.pace.sleep(options.item_delay) {
                return Err(ForkRunError::Cancelled {
                    ledger,
                    submitted: total,
                });
            }
        }

        tracing::info!(
            total = ledger.total,
            successful = ledger.successful,
            failed = ledger.failed,
            forked = ledger.forked,
            synced = ledger.synced,
            skipped = ledger.skipped,
            "fork run finished"
        );
        Ok(ledger)
    }

    /// Decide and perform the action for one repository. `None` means
    /// cancellation interrupted it before an outcome existed.
    fn process(&self, repo: &RepoRef, options: &RunOptions) -> Option<ForkOutcome> {
        let org = options.target_org.as_str();
        match self.check_existing(repo, org) {
            Existing::Missing => self.fork(repo, org),
            Existing::Unknown(reason) => {
                tracing::warn!(
                    owner = %repo.owner,
                    repo = %repo.name,
                    reason = %reason,
                    "could not verify target; attempting fork"
                );
                self.fork(repo, org)
            }
            Existing::VerifiedFork if options.sync_existing => self.sync(repo, org),
            Existing::VerifiedFork => Some(ForkOutcome::new(
                repo,
                ForkAction::Skip,
                true,
                format!("Fork already exists at {org}/{} (sync disabled)", repo.name),
            )),
            Existing::Foreign => Some(ForkOutcome::new(
                repo,
                ForkAction::Skip,
                true,
                format!(
                    "Repository {org}/{} exists (but not a fork of {})",
                    repo.name,
                    repo.full_name()
                ),
            )),
        }
    }

    fn check_existing(&self, repo: &RepoRef, org: &str) -> Existing {
        let url = format!("{}/repos/{org}/{}", self.api_base(), repo.name);
        let response = match self.lookup.send(Method::Get, &url, &[], None) {
            Ok(response) => response,
            Err(err) => return Existing::Unknown(err.to_string()),
        };

        match response.status {
            200 => match serde_json::from_str::<RepoLookup>(&response.body) {
                Ok(found) if is_fork_of(&found, repo) => Existing::VerifiedFork,
                Ok(_) => Existing::Foreign,
                Err(err) => Existing::Unknown(format!("unreadable lookup body: {err}")),
            },
            404 => Existing::Missing,
            status => Existing::Unknown(format!("lookup returned status {status}")),
        }
    }

    fn fork(&self, repo: &RepoRef, org: &str) -> Option<ForkOutcome> {
        let url = format!("{}/repos/{}/{}/forks", self.api_base(), repo.owner, repo.name);
        let body = json!({ "organization": org });
        let retry_cfg = &self.github.fork_retry;
        let policy = RetryPolicy::new(retry_cfg.max_attempts, retry_cfg.base_backoff);

        let result = retry(&policy, &self.pace, |attempt| {
            let reply = match self.mutate.send(Method::Post, &url, &[], Some(&body)) {
                Ok(response) => classify_fork(&response, repo, retry_cfg),
                Err(err) => classify_fork_error(&err, repo),
            };
            match reply {
                ForkReply::Created => {
                    Attempt::Done(Ok(format!("Successfully forked {}", repo.full_name())))
                }
                ForkReply::AlreadyExists => {
                    Attempt::Done(Ok(format!("Fork already exists for {}", repo.full_name())))
                }
                ForkReply::Permanent(message) => Attempt::Done(Err(message)),
                ForkReply::Retry(wait, message) => {
                    tracing::warn!(
                        owner = %repo.owner,
                        repo = %repo.name,
                        attempt,
                        max_attempts = retry_cfg.max_attempts,
                        reason = %message,
                        "fork attempt failed"
                    );
                    Attempt::Retry { wait, failure: message }
                }
            }
        });

        let (success, message) = match result {
            Ok(Ok(message)) => (true, message),
            Ok(Err(message)) => (false, message),
            Err(RetryError::Exhausted { last, .. }) => (false, last),
            Err(RetryError::Cancelled { .. }) => return None,
        };
        Some(ForkOutcome::new(repo, ForkAction::Fork, success, message))
    }

    fn sync(&self, repo: &RepoRef, org: &str) -> Option<ForkOutcome> {
        let target = format!("{org}/{}", repo.name);
        let mut reply = self.merge_upstream(repo, org, PRIMARY_BRANCH)?;
        if reply == MergeReply::WrongBranch {
            tracing::debug!(fork = %target, "retrying sync against {FALLBACK_BRANCH}");
            reply = self.merge_upstream(repo, org, FALLBACK_BRANCH)?;
        }

        let outcome = match reply {
            MergeReply::Merged => ForkOutcome::new(
                repo,
                ForkAction::Sync,
                true,
                format!("Successfully synced {target} with {}", repo.full_name()),
            ),
            MergeReply::UpToDate => ForkOutcome::new(
                repo,
                ForkAction::Sync,
                true,
                format!("Fork {target} is already up to date"),
            ),
            MergeReply::Conflict(message) | MergeReply::Failed(message) => ForkOutcome::new(
                repo,
                ForkAction::Skip,
                true,
                format!("Fork exists ({message})"),
            ),
            MergeReply::WrongBranch => ForkOutcome::new(
                repo,
                ForkAction::Skip,
                true,
                format!("Fork exists (Cannot sync {target}: branch mismatch or conflict)"),
            ),
        };
        Some(outcome)
    }

    /// One merge-upstream call for `branch`, retrying transport failures and
    /// server errors with backoff. `None` on cancellation.
    fn merge_upstream(&self, repo: &RepoRef, org: &str, branch: &str) -> Option<MergeReply> {
        let url = format!("{}/repos/{org}/{}/merge-upstream", self.api_base(), repo.name);
        let body = json!({ "branch": branch });
        let target = format!("{org}/{}", repo.name);
        let retry_cfg = &self.github.fork_retry;
        let policy = RetryPolicy::new(retry_cfg.sync_max_attempts, retry_cfg.base_backoff);

        let result = retry(&policy, &self.pace, |_| {
            match self.mutate.send(Method::Post, &url, &[], Some(&body)) {
                Ok(response) if response.status >= 500 => Attempt::Retry {
                    wait: Wait::Backoff,
                    failure: format!("Failed to sync {target}: {}", response.status),
                },
                Ok(response) => Attempt::Done(classify_merge(&response, &target)),
                Err(err) if err.is_transient() => Attempt::Retry {
                    wait: Wait::Backoff,
                    failure: format!("Error syncing {target}: {err}"),
                },
                Err(err) => {
                    Attempt::Done(MergeReply::Failed(format!("Error syncing {target}: {err}")))
                }
            }
        });

        match result {
            Ok(reply) => Some(reply),
            Err(RetryError::Exhausted { last, .. }) => Some(MergeReply::Failed(last)),
            Err(RetryError::Cancelled { .. }) => None,
        }
    }

    fn api_base(&self) -> &str {
        self.github.api_base.trim_end_matches('/')
    }
}

/// GitHub owner and repository names compare case-insensitively.
fn is_fork_of(found: &RepoLookup, repo: &RepoRef) -> bool {
    found.fork
        && found.source.as_ref().is_some_and(|source| {
            source.owner.login.eq_ignore_ascii_case(&repo.owner)
                && source.name.eq_ignore_ascii_case(&repo.name)
        })
}

fn classify_fork(response: &Response, repo: &RepoRef, cfg: &ForkRetryConfig) -> ForkReply {
    if response.is_success() {
        return ForkReply::Created;
    }
    match response.status {
        404 => ForkReply::Permanent(format!(
            "Repository {} not found or private",
            repo.full_name()
        )),
        403 => {
            let message = response
                .json_message()
                .unwrap_or_else(|| "Unknown error".to_string());
            let lowered = message.to_lowercase();
            if lowered.contains("submitted too quickly") {
                return ForkReply::Retry(
                    Wait::Fixed(cfg.throttle_cooldown),
                    format!("Permission denied: {message}"),
                );
            }
            if let Some(wait) = retry_after(response, cfg) {
                return ForkReply::Retry(
                    Wait::Fixed(wait),
                    format!("Rate limited: retry after {}s", wait.as_secs()),
                );
            }
            if lowered.contains("already exists") {
                return ForkReply::AlreadyExists;
            }
            ForkReply::Permanent(format!("Permission denied: {message}"))
        }
        429 => {
            let wait = retry_after(response, cfg).map_or(Wait::Backoff, Wait::Fixed);
            ForkReply::Retry(
                wait,
                format!("Rate limited forking {}: 429", repo.full_name()),
            )
        }
        status => ForkReply::Retry(
            Wait::Backoff,
            format!(
                "Failed to fork {}: {status} - {}",
                repo.full_name(),
                response.body_snippet(500)
            ),
        ),
    }
}

fn classify_fork_error(err: &HttpError, repo: &RepoRef) -> ForkReply {
    if err.is_timeout() {
        ForkReply::Retry(
            Wait::Backoff,
            format!("Timeout while forking {}", repo.full_name()),
        )
    } else if err.is_transient() {
        ForkReply::Retry(
            Wait::Backoff,
            format!("Error forking {}: {err}", repo.full_name()),
        )
    } else {
        ForkReply::Permanent(format!("Error forking {}: {err}", repo.full_name()))
    }
}

/// `Retry-After` in whole seconds, or the configured fallback when the
/// header is present but not an integer. Capped at `max_retry_after`.
fn retry_after(response: &Response, cfg: &ForkRetryConfig) -> Option<Duration> {
    let raw = response.header("Retry-After")?;
    let wait = raw
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .unwrap_or(cfg.retry_after_fallback);
    Some(wait.min(cfg.max_retry_after))
}

fn classify_merge(response: &Response, target: &str) -> MergeReply {
    match response.status {
        200 => MergeReply::Merged,
        409 => {
            let message = response.json_message().unwrap_or_default();
            if message.to_lowercase().contains("up to date") {
                MergeReply::UpToDate
            } else {
                MergeReply::Conflict(format!("Cannot sync {target}: {message}"))
            }
        }
        422 => MergeReply::WrongBranch,
        status => MergeReply::Failed(format!("Failed to sync {target}: {status}")),
    }
}

fn log_outcome(outcome: &ForkOutcome) {
    if outcome.success {
        tracing::info!(
            owner = %outcome.owner,
            repo = %outcome.name,
            action = %outcome.action,
            "{}",
            outcome.message
        );
    } else {
        tracing::warn!(
            owner = %outcome.owner,
            repo = %outcome.name,
            action = %outcome.action,
            "{}",
            outcome.message
        );
    }
}
