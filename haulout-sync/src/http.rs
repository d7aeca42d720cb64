//! Rate-limited HTTP client and the transport seam beneath it.
//!
//! [`HttpClient`] is the only way requests leave this crate. It attaches the
//! identification header, the optional credential and a hard per-call
//! timeout, then hands a fully-described [`Request`] to a [`Transport`].
//! It never retries; callers own their retry policy.
//!
//! Non-2xx statuses are returned as ordinary [`Response`]s. Only failures to
//! obtain a response at all become [`HttpError`]s.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::HttpError;

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// A fully-described outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// JSON body, already serialized.
    pub body: Option<String>,
    pub timeout: Duration,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `message` field of a JSON error body, if there is one.
    pub fn json_message(&self) -> Option<String> {
        serde_json::from_str::<Value>(&self.body)
            .ok()?
            .get("message")?
            .as_str()
            .map(str::to_owned)
    }

    /// The body, cut to at most `max` characters for log and report lines.
    pub fn body_snippet(&self, max: usize) -> String {
        let mut snippet: String = self.body.chars().take(max).collect();
        if self.body.chars().count() > max {
            snippet.push('…');
        }
        snippet
    }
}

/// First header value matching `name`, case-insensitively.
pub fn header_get<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// Boundary for all network I/O. Production uses [`UreqTransport`]; tests
/// script responses in memory.
pub trait Transport: Send + Sync {
    fn send(&self, request: &Request) -> Result<Response, HttpError>;
}

/// Blocking transport backed by a shared `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &Request) -> Result<Response, HttpError> {
        let mut req = self
            .agent
            .request(request.method.as_str(), &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.query {
            req = req.query(name, value);
        }
        for (name, value) in &request.headers {
            req = req.set(name, value);
        }

        let result = match &request.body {
            Some(body) => req.set("Content-Type", "application/json").send_string(body),
            None => req.call(),
        };

        let response = match result {
            Ok(response) => response,
            // 4xx/5xx still carry a response the caller needs to inspect.
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                return Err(classify_transport(&request.url, &transport));
            }
        };

        let status = response.status();
        let headers = response
            .headers_names()
            .into_iter()
            .filter_map(|name| {
                let value = response.header(&name)?.to_string();
                Some((name, value))
            })
            .collect();
        let body = response.into_string().map_err(|err| {
            if is_timeout_io(&err) {
                HttpError::Timeout {
                    url: request.url.clone(),
                }
            } else {
                HttpError::Transport {
                    url: request.url.clone(),
                    message: format!("reading body: {err}"),
                }
            }
        })?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

fn classify_transport(url: &str, err: &ureq::Transport) -> HttpError {
    use ureq::ErrorKind;

    let url = url.to_string();
    let message = err.to_string();
    match err.kind() {
        ErrorKind::InvalidUrl
        | ErrorKind::UnknownScheme
        | ErrorKind::InsecureRequestHttpsOnly
        | ErrorKind::InvalidProxyUrl => HttpError::Fatal { url, message },
        _ if source_is_timeout(err) || message.contains("timed out") => HttpError::Timeout { url },
        _ => HttpError::Transport { url, message },
    }
}

fn source_is_timeout(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            return is_timeout_io(io);
        }
        source = inner.source();
    }
    false
}

fn is_timeout_io(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Static credential attached to every request from a client.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// `Cookie: <value>`
    Cookie(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Credential::Cookie(_) => f.write_str("Cookie(<redacted>)"),
        }
    }
}

/// Identification + credential + timeout wrapper over a [`Transport`].
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    user_agent: String,
    credential: Option<Credential>,
    extra_headers: Vec<(String, String)>,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        user_agent: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            user_agent: user_agent.into(),
            credential: None,
            extra_headers: Vec::new(),
            timeout,
        }
    }

    #[must_use]
    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.extra_headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Same client, different hard timeout.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut client = self.clone();
        client.timeout = timeout;
        client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue one request. Returns the response for any status code.
    pub fn send(
        &self,
        method: Method,
        url: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Response, HttpError> {
        let mut headers = vec![("User-Agent".to_string(), self.user_agent.clone())];
        match &self.credential {
            Some(Credential::Bearer(token)) => {
                headers.push(("Authorization".to_string(), format!("Bearer {token}")));
            }
            Some(Credential::Cookie(cookie)) => {
                headers.push(("Cookie".to_string(), cookie.clone()));
            }
            None => {}
        }
        headers.extend(self.extra_headers.iter().cloned());

        let request = Request {
            method,
            url: url.to_string(),
            query: params.to_vec(),
            headers,
            body: body.map(Value::to_string),
            timeout: self.timeout,
        };

        tracing::debug!(method = method.as_str(), url, "sending request");
        let response = self.transport.send(&request)?;
        tracing::debug!(status = response.status, url, "received response");
        Ok(response)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("user_agent", &self.user_agent)
            .field("credential", &self.credential)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::ScriptedTransport;

    #[test]
    fn client_attaches_identification_credential_and_timeout() {
        let transport = ScriptedTransport::new();
        transport.push(Method::Get, "https://api.test/x", Ok(Response::new(200, "{}")));

        let client = HttpClient::new(transport.shared(), "haulout-test", Duration::from_secs(7))
            .with_credential(Some(Credential::Bearer("t0k".into())))
            .with_header("Accept", "application/json");
        let params = vec![("limit".to_string(), "20".to_string())];
        client
            .send(Method::Get, "https://api.test/x", &params, None)
            .expect("send");

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header("user-agent"), Some("haulout-test"));
        assert_eq!(sent[0].header("authorization"), Some("Bearer t0k"));
        assert_eq!(sent[0].header("accept"), Some("application/json"));
        assert_eq!(sent[0].query_param("limit"), Some("20"));
        assert_eq!(sent[0].timeout, Duration::from_secs(7));
    }

    #[test]
    fn cookie_credential_uses_cookie_header() {
        let transport = ScriptedTransport::new();
        transport.push(Method::Post, "https://api.test/y", Ok(Response::new(202, "")));

        let client = HttpClient::new(transport.shared(), "ua", Duration::from_secs(1))
            .with_credential(Some(Credential::Cookie("session=abc".into())));
        client
            .send(Method::Post, "https://api.test/y", &[], Some(&json!({"a": 1})))
            .expect("send");

        let sent = transport.requests();
        assert_eq!(sent[0].header("cookie"), Some("session=abc"));
        assert!(sent[0].header("authorization").is_none());
        assert_eq!(sent[0].body.as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn non_success_status_is_a_response_not_an_error() {
        let transport = ScriptedTransport::new();
        transport.push(Method::Get, "https://api.test/z", Ok(Response::new(503, "busy")));

        let client = HttpClient::new(transport.shared(), "ua", Duration::from_secs(1));
        let response = client
            .send(Method::Get, "https://api.test/z", &[], None)
            .expect("response");
        assert_eq!(response.status, 503);
        assert!(!response.is_success());
    }

    #[test]
    fn credentials_are_redacted_in_debug_output() {
        let rendered = format!("{:?}", Credential::Bearer("secret".into()));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn response_helpers() {
        let response =
            Response::new(403, r#"{"message":"Slow down"}"#).with_header("Retry-After", "5");
        assert_eq!(response.header("retry-after"), Some("5"));
        assert_eq!(response.json_message().as_deref(), Some("Slow down"));
        assert_eq!(Response::new(200, "abcdef").body_snippet(3), "abc…");
    }

    #[test]
    fn timeouts_are_transient() {
        let err = HttpError::Timeout {
            url: "https://x".into(),
        };
        assert!(err.is_transient());
        let err = HttpError::Fatal {
            url: "x".into(),
            message: "bad url".into(),
        };
        assert!(!err.is_transient());
    }
}
