//! Cursor-paginated listing harvester.
//!
//! ## Page loop
//!
//! 1. Request `limit=20` plus `after=<cursor>` once a cursor is known.
//! 2. Keep items whose id has not been seen this session, in page order.
//! 3. Stop on the first matching signal:
//!    - the page contributed no new items (even if the server claims more),
//!    - `hasNext` is false or the pagination block is missing,
//!    - no `nextCursor` was issued.
//! 4. Otherwise advance the cursor, report progress, pause, continue.
//!
//! A failed page (transport error, timeout, non-2xx, unreadable body) is
//! retried once with the exact same parameters after a cooldown. A second
//! failure aborts the harvest with [`HarvestError::PageFailed`].

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use haulout_core::{Cursor, Item, ItemId, ListingConfig, PAGE_SIZE};

use crate::error::{HarvestError, HttpError};
use crate::http::{HttpClient, Method};
use crate::pace::Pace;
use crate::progress::HarvestObserver;
use crate::retry::{retry, Attempt, RetryError, RetryPolicy, Wait};

/// Why a harvest ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A page contained only already-seen items (or none at all).
    NoNewItems,
    /// The server reported no further pages.
    NoMorePages,
    /// The server did not issue a continuation cursor.
    NoCursor,
    /// The page budget was used up.
    PageLimit,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            StopReason::NoNewItems => "no new items",
            StopReason::NoMorePages => "no more pages",
            StopReason::NoCursor => "no continuation cursor",
            StopReason::PageLimit => "page limit reached",
        };
        f.write_str(text)
    }
}

/// A completed harvest.
#[derive(Debug, Clone, PartialEq)]
pub struct Harvest {
    /// Deduplicated items in discovery order.
    pub items: Vec<Item>,
    /// Page requests that returned a usable page.
    pub pages_fetched: usize,
    pub stop: StopReason,
}

/// One decoded listing page.
#[derive(Debug, Clone, PartialEq)]
struct Page {
    items: Vec<Item>,
    has_next: bool,
    next_cursor: Option<Cursor>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<PageData>,
}

#[derive(Debug, Deserialize)]
struct PageData {
    #[serde(default)]
    items: Option<Vec<Value>>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_next: Option<bool>,
}

/// Walks the listing endpoint described by a [`ListingConfig`].
#[derive(Debug)]
pub struct Harvester<'a> {
    client: HttpClient,
    listing: &'a ListingConfig,
    pace: Pace,
}

impl<'a> Harvester<'a> {
    /// `client` should already carry the listing credential and timeout.
    pub fn new(client: HttpClient, listing: &'a ListingConfig, pace: Pace) -> Self {
        Self {
            client,
            listing,
            pace,
        }
    }

    /// Harvest at most `page_limit` pages.
    pub fn harvest(
        &self,
        page_limit: usize,
        observer: &mut dyn HarvestObserver,
    ) -> Result<Harvest, HarvestError> {
        let mut seen: HashSet<ItemId> = HashSet::new();
        let mut items: Vec<Item> = Vec::new();
        let mut cursor: Option<Cursor> = None;
        let mut page_index = 0usize;
        let mut pages_fetched = 0usize;
        let policy = RetryPolicy::once_after(self.listing.retry_cooldown);

        let stop = loop {
            if page_index >= page_limit {
                break StopReason::PageLimit;
            }
            if self.pace.is_cancelled() {
                return Err(HarvestError::Cancelled { partial: items });
            }

            let page_number = page_index + 1;
            // Captured once so the retry re-sends exactly what failed.
            let params = self.page_params(cursor.as_ref());
            let fetched = retry(&policy, &self.pace, |attempt| match self.fetch_page(&params) {
                Ok(page) => Attempt::Done(page),
                Err(err) => {
                    tracing::warn!(
                        page = page_number,
                        attempt,
                        error = %err,
                        "page request failed"
                    );
                    Attempt::Retry {
                        wait: Wait::Fixed(self.listing.retry_cooldown),
                        failure: err,
                    }
                }
            });
            let page = match fetched {
                Ok(page) => page,
                Err(RetryError::Exhausted { last, .. }) => {
                    tracing::error!(page = page_number, error = %last, "aborting harvest");
                    return Err(HarvestError::PageFailed {
                        page: page_number,
                        source: last,
                        partial: items,
                    });
                }
                Err(RetryError::Cancelled { .. }) => {
                    return Err(HarvestError::Cancelled { partial: items });
                }
            };
            pages_fetched += 1;

            let before = items.len();
            let received = page.items.len();
            for item in page.items {
                if seen.insert(item.id.clone()) {
                    items.push(item);
                }
            }
            let fresh = items.len() - before;
            tracing::info!(
                page = page_number,
                new = fresh,
                duplicates = received - fresh,
                total = items.len(),
                has_next = page.has_next,
                "fetched page"
            );

            if fresh == 0 {
                break StopReason::NoNewItems;
            }
            if !page.has_next {
                break StopReason::NoMorePages;
            }
            let Some(next) = page.next_cursor else {
                break StopReason::NoCursor;
            };

            cursor = Some(next);
            page_index += 1;
            observer.page_done(page_index, items.len());

            if page_index < page_limit && !self.pace.sleep(self.listing.page_delay) {
                return Err(HarvestError::Cancelled { partial: items });
            }
        };

        tracing::info!(
            items = items.len(),
            pages = pages_fetched,
            reason = %stop,
            "harvest finished"
        );
        Ok(Harvest {
            items,
            pages_fetched,
            stop,
        })
    }

    fn page_params(&self, cursor: Option<&Cursor>) -> Vec<(String, String)> {
        let mut params = vec![
            ("hackathonId".to_string(), self.listing.collection_id.clone()),
            ("limit".to_string(), PAGE_SIZE.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("after".to_string(), cursor.0.clone()));
        }
        params
    }

    fn fetch_page(&self, params: &[(String, String)]) -> Result<Page, HttpError> {
        let url = &self.listing.endpoint;
        let response = self.client.send(Method::Get, url, params, None)?;
        if !response.is_success() {
            return Err(HttpError::Status {
                url: url.clone(),
                status: response.status,
                body: response.body_snippet(200),
            });
        }
        decode_page(url, &response.body)
    }
}

fn decode_page(url: &str, body: &str) -> Result<Page, HttpError> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|e| HttpError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    let Some(data) = envelope.data else {
        return Ok(Page {
            items: Vec::new(),
            has_next: false,
            next_cursor: None,
        });
    };

    let mut items = Vec::new();
    for raw in data.items.unwrap_or_default() {
        match Item::from_value(raw) {
            Some(item) => items.push(item),
            None => tracing::warn!(url, "skipping listing entry without a usable id"),
        }
    }

    let (has_next, next_cursor) = match data.pagination {
        Some(p) => (
            p.has_next.unwrap_or(false),
            p.next_cursor.filter(|c| !c.is_empty()).map(Cursor),
        ),
        None => (false, None),
    };

    Ok(Page {
        items,
        has_next,
        next_cursor,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::http::Response;
    use crate::pace::CancelToken;
    use crate::testing::{RecordingSleeper, ScriptedTransport};

    const ENDPOINT: &str = "https://listing.test/api/projects";

    fn listing() -> ListingConfig {
        ListingConfig {
            endpoint: ENDPOINT.to_string(),
            collection_id: "hack-1".to_string(),
            page_delay: Duration::from_millis(500),
            retry_cooldown: Duration::from_secs(3),
            ..ListingConfig::default()
        }
    }

    fn page(ids: &[&str], has_next: bool, cursor: Option<&str>) -> Response {
        let items: Vec<_> = ids.iter().map(|id| json!({"id": id, "track": "AI"})).collect();
        Response::new(
            200,
            json!({
                "success": true,
                "data": {
                    "items": items,
                    "pagination": {"nextCursor": cursor, "hasNext": has_next}
                }
            })
            .to_string(),
        )
    }

    fn ids(items: &[Item]) -> Vec<String> {
        items.iter().map(|i| i.id.0.clone()).collect()
    }

    #[test]
    fn decode_tolerates_missing_pagination_and_data() {
        let page = decode_page(ENDPOINT, r#"{"data":{"items":[{"id":"a"}]}}"#).expect("page");
        assert_eq!(page.items.len(), 1);
        assert!(!page.has_next);
        assert!(page.next_cursor.is_none());

        let page = decode_page(ENDPOINT, r#"{"success":false}"#).expect("page");
        assert!(page.items.is_empty());
        assert!(!page.has_next);
    }

    #[test]
    fn decode_skips_entries_without_ids_and_empty_cursor() {
        let body = concat!(
            r#"{"data":{"items":[{"id":"a"},{"name":"x"},null],"#,
            r#""pagination":{"nextCursor":"","hasNext":true}}}"#,
        );
        let page = decode_page(ENDPOINT, body).expect("page");
        assert_eq!(ids(&page.items), vec!["a"]);
        assert!(page.has_next);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn decode_rejects_non_json() {
        let err = decode_page(ENDPOINT, "<html>").unwrap_err();
        assert!(matches!(err, HttpError::Decode { .. }));
    }

    #[test]
    fn cursor_is_sent_as_after_and_courtesy_pause_between_pages() {
        let transport = ScriptedTransport::new();
        transport.push(Method::Get, ENDPOINT, Ok(page(&["a"], true, Some("c1"))));
        transport.push(Method::Get, ENDPOINT, Ok(page(&["b"], false, None)));
        let sleeper = RecordingSleeper::new();
        let listing = listing();
        let harvester = Harvester::new(
            HttpClient::new(transport.shared(), "ua", Duration::from_secs(30)),
            &listing,
            Pace::new(sleeper.shared(), CancelToken::new()),
        );

        let mut progress = Vec::new();
        let harvest = harvester
            .harvest(10, &mut |page: usize, total: usize| progress.push((page, total)))
            .expect("harvest");

        assert_eq!(ids(&harvest.items), vec!["a", "b"]);
        assert_eq!(harvest.stop, StopReason::NoMorePages);
        assert_eq!(progress, vec![(1, 1)]);
        assert_eq!(sleeper.waits(), vec![Duration::from_millis(500)]);

        let sent = transport.requests();
        assert_eq!(sent[0].query_param("after"), None);
        assert_eq!(sent[0].query_param("limit"), Some("20"));
        assert_eq!(sent[0].query_param("hackathonId"), Some("hack-1"));
        assert_eq!(sent[1].query_param("after"), Some("c1"));
    }

    #[test]
    fn retry_resends_identical_parameters_after_cooldown() {
        let transport = ScriptedTransport::new();
        transport.push(Method::Get, ENDPOINT, Ok(page(&["a"], true, Some("c1"))));
        transport.push(Method::Get, ENDPOINT, Ok(Response::new(502, "bad gateway")));
        transport.push(Method::Get, ENDPOINT, Ok(page(&["b"], false, None)));
        let sleeper = RecordingSleeper::new();
        let listing = listing();
        let harvester = Harvester::new(
            HttpClient::new(transport.shared(), "ua", Duration::from_secs(30)),
            &listing,
            Pace::new(sleeper.shared(), CancelToken::new()),
        );

        let harvest = harvester.harvest(10, &mut crate::progress::Silent).expect("harvest");
        assert_eq!(ids(&harvest.items), vec!["a", "b"]);
        assert_eq!(harvest.pages_fetched, 2);

        let sent = transport.requests();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1].query, sent[2].query);
        assert_eq!(
            sleeper.waits(),
            vec![Duration::from_millis(500), Duration::from_secs(3)]
        );
    }

    #[test]
    fn second_failure_aborts_with_partial_items() {
        let transport = ScriptedTransport::new();
        transport.push(Method::Get, ENDPOINT, Ok(page(&["a", "b"], true, Some("c1"))));
        transport.push(
            Method::Get,
            ENDPOINT,
            Err(HttpError::Timeout { url: ENDPOINT.into() }),
        );
        transport.push(Method::Get, ENDPOINT, Ok(Response::new(500, "oops")));
        let sleeper = RecordingSleeper::new();
        let listing = listing();
        let harvester = Harvester::new(
            HttpClient::new(transport.shared(), "ua", Duration::from_secs(30)),
            &listing,
            Pace::new(sleeper.shared(), CancelToken::new()),
        );

        let err = harvester.harvest(10, &mut crate::progress::Silent).unwrap_err();
        match &err {
            HarvestError::PageFailed { page, source, partial } => {
                assert_eq!(*page, 2);
                assert!(matches!(source, HttpError::Status { status: 500, .. }));
                assert_eq!(ids(partial), vec!["a", "b"]);
            }
            other => panic!("expected page failure, got {other:?}"),
        }
        assert_eq!(transport.requests().len(), 3);
    }

    #[test]
    fn cancellation_during_page_pause_returns_partial() {
        let transport = ScriptedTransport::new();
        transport.push(Method::Get, ENDPOINT, Ok(page(&["a"], true, Some("c1"))));
        let sleeper = RecordingSleeper::new().cancel_on(1);
        let listing = listing();
        let harvester = Harvester::new(
            HttpClient::new(transport.shared(), "ua", Duration::from_secs(30)),
            &listing,
            Pace::new(sleeper.shared(), CancelToken::new()),
        );

        let err = harvester.harvest(10, &mut crate::progress::Silent).unwrap_err();
        assert!(matches!(err, HarvestError::Cancelled { .. }));
        assert_eq!(ids(err.partial()), vec!["a"]);
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn zero_page_limit_issues_no_requests() {
        let transport = ScriptedTransport::new();
        let listing = listing();
        let harvester = Harvester::new(
            HttpClient::new(transport.shared(), "ua", Duration::from_secs(30)),
            &listing,
            Pace::new(RecordingSleeper::new().shared(), CancelToken::new()),
        );
        let harvest = harvester.harvest(0, &mut crate::progress::Silent).expect("harvest");
        assert!(harvest.items.is_empty());
        assert_eq!(harvest.stop, StopReason::PageLimit);
        assert!(transport.requests().is_empty());
    }
}
