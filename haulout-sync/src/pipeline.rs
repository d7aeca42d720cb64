//! Shared entrypoints used by the CLI.
//!
//! Builds the HTTP clients from a [`Config`], runs the harvester or the
//! orchestrator, and persists the result. The transport and pace are passed
//! in so the same path runs against scripted responses in tests.

use std::path::Path;
use std::sync::Arc;

use haulout_core::{report, Config, Ledger, RepoRef};

use crate::error::{ForkRunError, HarvestError, SyncError};
use crate::fork::{Orchestrator, RunOptions};
use crate::harvest::{Harvest, Harvester};
use crate::http::{Credential, HttpClient, Transport};
use crate::pace::Pace;
use crate::progress::{ForkObserver, HarvestObserver};

/// Client for the listing endpoint: session cookie and listing timeout.
pub fn listing_client(config: &Config, transport: Arc<dyn Transport>) -> HttpClient {
    HttpClient::new(transport, config.user_agent.clone(), config.listing.timeout)
        .with_credential(config.listing.cookie.clone().map(Credential::Cookie))
}

/// Client for the GitHub API: bearer token. Timeouts are set per call by the
/// orchestrator.
pub fn github_client(config: &Config, transport: Arc<dyn Transport>) -> HttpClient {
    HttpClient::new(transport, config.user_agent.clone(), config.github.mutation_timeout)
        .with_credential(config.github.token.clone().map(Credential::Bearer))
}

/// Harvest up to `page_limit` pages.
pub fn harvest(
    config: &Config,
    page_limit: usize,
    transport: Arc<dyn Transport>,
    pace: Pace,
    observer: &mut dyn HarvestObserver,
) -> Result<Harvest, HarvestError> {
    let client = listing_client(config, transport);
    Harvester::new(client, &config.listing, pace).harvest(page_limit, observer)
}

/// Harvest and write the items to `output`.
///
/// A cancelled harvest always writes what it collected. A harvest aborted by
/// a failed page writes its partial items only if `keep_partial` is set. The
/// harvest error is returned either way.
pub fn harvest_to_file(
    config: &Config,
    page_limit: usize,
    output: &Path,
    keep_partial: bool,
    transport: Arc<dyn Transport>,
    pace: Pace,
    observer: &mut dyn HarvestObserver,
) -> Result<Harvest, SyncError> {
    match harvest(config, page_limit, transport, pace, observer) {
        Ok(harvest) => {
            report::save_items(output, &harvest.items)?;
            tracing::info!(path = %output.display(), items = harvest.items.len(), "wrote harvest");
            Ok(harvest)
        }
        Err(err) => {
            if keep_partial || matches!(err, HarvestError::Cancelled { .. }) {
                report::save_items(output, err.partial())?;
                tracing::warn!(
                    path = %output.display(),
                    items = err.partial().len(),
                    "wrote partial harvest"
                );
            }
            Err(err.into())
        }
    }
}

/// Fork or sync every repository into `options.target_org`.
pub fn fork_all(
    config: &Config,
    repos: &[RepoRef],
    options: &RunOptions,
    transport: Arc<dyn Transport>,
    pace: Pace,
    observer: &mut dyn ForkObserver,
) -> Result<Ledger, ForkRunError> {
    let client = github_client(config, transport);
    Orchestrator::new(client, &config.github, pace).run(repos, options, observer)
}

/// Run [`fork_all`] and write the ledger to `report_path`.
///
/// A cancelled run still writes the ledger of completed repositories before
/// the error is returned.
pub fn fork_to_report(
    config: &Config,
    repos: &[RepoRef],
    options: &RunOptions,
    report_path: &Path,
    transport: Arc<dyn Transport>,
    pace: Pace,
    observer: &mut dyn ForkObserver,
) -> Result<Ledger, SyncError> {
    match fork_all(config, repos, options, transport, pace, observer) {
        Ok(ledger) => {
            report::save_ledger(report_path, &ledger)?;
            tracing::info!(path = %report_path.display(), "wrote fork report");
            Ok(ledger)
        }
        Err(err) => {
            let ForkRunError::Cancelled { ledger, .. } = &err;
            report::save_ledger(report_path, ledger)?;
            tracing::warn!(
                path = %report_path.display(),
                recorded = ledger.total,
                "wrote partial fork report"
            );
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::http::{Method, Response};
    use crate::pace::CancelToken;
    use crate::progress::Silent;
    use crate::testing::{RecordingSleeper, ScriptedTransport};

    const LISTING: &str = "https://listing.test/api/projects";

    fn config() -> Config {
        let mut config = Config::default();
        config.listing.endpoint = LISTING.to_string();
        config.listing.cookie = Some("session=1".to_string());
        config.github.api_base = "https://gh.test".to_string();
        config.github.token = Some("tok".to_string());
        config.github.item_delay = Duration::ZERO;
        config
    }

    fn page(ids: &[&str], has_next: bool) -> Response {
        let items: Vec<_> = ids.iter().map(|id| json!({ "id": id })).collect();
        Response::new(
            200,
            json!({
                "data": {
                    "items": items,
                    "pagination": { "hasNext": has_next, "nextCursor": null }
                }
            })
            .to_string(),
        )
    }

    #[test]
    fn harvest_writes_items_and_sends_cookie() {
        let dir = TempDir::new().expect("tempdir");
        let output = dir.path().join("out").join("projects.json");
        let transport = ScriptedTransport::new();
        transport.push(Method::Get, LISTING, Ok(page(&["a", "b"], false)));
        let sleeper = RecordingSleeper::new();

        let harvest = harvest_to_file(
            &config(),
            5,
            &output,
            false,
            transport.shared(),
            Pace::new(sleeper.shared(), CancelToken::new()),
            &mut Silent,
        )
        .expect("harvest");

        assert_eq!(harvest.items.len(), 2);
        let saved = report::load_items(&output).expect("load");
        assert_eq!(saved, harvest.items);
        assert_eq!(transport.requests()[0].header("cookie"), Some("session=1"));
    }

    #[test]
    fn failed_harvest_keeps_partial_only_when_asked() {
        let dir = TempDir::new().expect("tempdir");
        for keep in [false, true] {
            let output = dir.path().join(format!("projects-{keep}.json"));
            let transport = ScriptedTransport::new();
            let first = json!({
                "data": {
                    "items": [{"id": "a"}],
                    "pagination": { "hasNext": true, "nextCursor": "c1" }
                }
            });
            transport.push(Method::Get, LISTING, Ok(Response::new(200, first.to_string())));
            transport.push_n(Method::Get, LISTING, Ok(Response::new(500, "down")), 2);
            let sleeper = RecordingSleeper::new();

            let err = harvest_to_file(
                &config(),
                5,
                &output,
                keep,
                transport.shared(),
                Pace::new(sleeper.shared(), CancelToken::new()),
                &mut Silent,
            )
            .expect_err("harvest should fail");

            assert!(matches!(err, SyncError::Harvest(HarvestError::PageFailed { page: 2, .. })));
            assert_eq!(output.exists(), keep);
        }
    }

    #[test]
    fn cancelled_fork_run_still_writes_report() {
        let dir = TempDir::new().expect("tempdir");
        let report_path = dir.path().join("fork_report.json");
        let mut config = config();
        config.github.item_delay = Duration::from_secs(10);

        let transport = ScriptedTransport::new();
        let lookup = "https://gh.test/repos/walrus-haulout/one";
        transport.push(Method::Get, lookup, Ok(Response::new(404, "{}")));
        let forks = "https://gh.test/repos/acme/one/forks";
        transport.push(Method::Post, forks, Ok(Response::new(202, "{}")));
        let sleeper = RecordingSleeper::new().cancel_on(1);
        let repos = vec![RepoRef::new("acme", "one"), RepoRef::new("acme", "two")];

        let err = fork_to_report(
            &config,
            &repos,
            &RunOptions::from_config(&config.github),
            &report_path,
            transport.shared(),
            Pace::new(sleeper.shared(), CancelToken::new()),
            &mut Silent,
        )
        .expect_err("cancelled");

        assert!(matches!(err, SyncError::ForkRun(_)));
        let ledger = report::load_ledger(&report_path).expect("report");
        assert_eq!(ledger.total, 1);
        assert_eq!(ledger.forked, 1);
        assert_eq!(
            transport.requests()[1].header("authorization"),
            Some("Bearer tok")
        );
    }
}
