//! In-memory test doubles for the transport and sleeper seams.
//!
//! No sockets and no real waiting: responses are scripted per
//! `(method, url)` and every requested sleep is recorded instead of slept.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::HttpError;
use crate::http::{Method, Request, Response, Transport};
use crate::pace::{CancelToken, Sleeper};

type Route = (Method, String);

/// Transport that replays scripted results and records every request.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<ScriptedInner>>,
}

#[derive(Default)]
struct ScriptedInner {
    routes: HashMap<Route, VecDeque<Result<Response, HttpError>>>,
    requests: Vec<Request>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The same transport as a trait object for [`crate::http::HttpClient`].
    pub fn shared(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    /// Queue a result for `method url`. Results for one route are returned
    /// in FIFO order; query parameters are not part of the route.
    pub fn push(&self, method: Method, url: &str, result: Result<Response, HttpError>) {
        self.lock()
            .routes
            .entry((method, url.to_string()))
            .or_default()
            .push_back(result);
    }

    /// Queue the same result `times` times.
    pub fn push_n(
        &self,
        method: Method,
        url: &str,
        result: Result<Response, HttpError>,
        times: usize,
    ) {
        for _ in 0..times {
            self.push(method, url, result.clone());
        }
    }

    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    /// Number of recorded requests for one route.
    pub fn count(&self, method: Method, url: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptedInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &Request) -> Result<Response, HttpError> {
        let mut inner = self.lock();
        inner.requests.push(request.clone());
        let key = (request.method, request.url.clone());
        match inner.routes.get_mut(&key).and_then(VecDeque::pop_front) {
            Some(result) => result,
            None => Err(HttpError::Fatal {
                url: request.url.clone(),
                message: format!(
                    "no scripted response for {} {}",
                    request.method.as_str(),
                    request.url
                ),
            }),
        }
    }
}

/// Sleeper that records requested waits and returns immediately.
///
/// With [`RecordingSleeper::cancel_on`], the n-th sleep (1-based) cancels
/// the token and reports an interrupted wait.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    inner: Arc<Mutex<SleeperInner>>,
}

#[derive(Default)]
struct SleeperInner {
    waits: Vec<Duration>,
    cancel_on: Option<usize>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cancel_on(self, call: usize) -> Self {
        self.lock().cancel_on = Some(call);
        self
    }

    pub fn shared(&self) -> Arc<dyn Sleeper> {
        Arc::new(self.clone())
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.lock().waits.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SleeperInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool {
        let mut inner = self.lock();
        inner.waits.push(duration);
        if inner.cancel_on == Some(inner.waits.len()) {
            cancel.cancel();
            return false;
        }
        !cancel.is_cancelled()
    }
}
