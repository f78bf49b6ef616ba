//! Blocking HTTP seam shared by the Walrus and JSON-RPC clients.
//!
//! Both clients speak plain HTTP through [`HttpTransport`]. The production
//! implementation wraps a `ureq::Agent` with request and connect timeouts;
//! tests substitute an in-memory transport. Calls are blocking and are moved
//! off the async runtime with [`run_blocking`].

use std::io::Read;
use std::time::Duration;

use serde_json::Value;
use vitae_types::env_var_or;

/// Default request timeout in seconds (`VITAE_TIMEOUT_SECS`).
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default connect timeout in seconds (`VITAE_CONNECT_TIMEOUT_SECS`).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone, Default)]
pub struct HttpReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Short, log-friendly rendering of the body (first 200 chars).
    pub fn body_preview(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        text.chars().take(200).collect()
    }
}

/// Transport-level failure: the request never produced an HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(pub String);

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TransportError {}

/// Minimal HTTP surface used by the clients in this crate.
///
/// Implementations must return `Ok` for every response that carries a status
/// code (including 4xx/5xx) and reserve `Err` for connection-level failures.
pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpReply, TransportError>;

    fn put(&self, url: &str, body: &[u8], content_type: &str) -> Result<HttpReply, TransportError>;

    fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, TransportError>;
}

/// `ureq`-backed transport with bounded timeouts.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    timeout: Duration,
}

impl UreqTransport {
    /// Build a transport using `VITAE_TIMEOUT_SECS` / `VITAE_CONNECT_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let (timeout, connect_timeout) = default_timeouts();
        Self::with_timeouts(timeout, connect_timeout)
    }

    pub fn with_timeouts(timeout: Duration, connect_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .timeout_connect(connect_timeout)
            .build();
        Self { agent, timeout }
    }

    /// Overall request timeout this agent enforces.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn finish(result: Result<ureq::Response, ureq::Error>) -> Result<HttpReply, TransportError> {
        let response = match result {
            Ok(response) => response,
            // ureq reports 4xx/5xx as errors; they are still HTTP replies to us.
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(t)) => return Err(TransportError(t.to_string())),
        };

        let status = response.status();
        let content_type = response.header("content-type").map(str::to_string);
        let content_disposition = response.header("content-disposition").map(str::to_string);
        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| TransportError(format!("failed to read response body: {}", e)))?;

        Ok(HttpReply {
            status,
            content_type,
            content_disposition,
            body,
        })
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::from_env()
    }
}

impl HttpTransport for UreqTransport {
    fn get(&self, url: &str) -> Result<HttpReply, TransportError> {
        Self::finish(self.agent.get(url).set("Accept", "*/*").call())
    }

    fn put(&self, url: &str, body: &[u8], content_type: &str) -> Result<HttpReply, TransportError> {
        Self::finish(
            self.agent
                .put(url)
                .set("Content-Type", content_type)
                .send_bytes(body),
        )
    }

    fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, TransportError> {
        Self::finish(
            self.agent
                .post(url)
                .set("Content-Type", "application/json")
                .send_json(body),
        )
    }
}

/// Request and connect timeouts from the environment.
pub fn default_timeouts() -> (Duration, Duration) {
    (
        Duration::from_secs(env_var_or("VITAE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)),
        Duration::from_secs(env_var_or(
            "VITAE_CONNECT_TIMEOUT_SECS",
            DEFAULT_CONNECT_TIMEOUT_SECS,
        )),
    )
}

/// Why a blocking call did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockingFailure {
    /// The deadline elapsed; the caller stopped waiting.
    TimedOut(Duration),
    /// The worker thread panicked or was cancelled.
    Aborted(String),
}

impl std::fmt::Display for BlockingFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockingFailure::TimedOut(d) => write!(f, "timed out after {}ms", d.as_millis()),
            BlockingFailure::Aborted(msg) => write!(f, "worker aborted: {}", msg),
        }
    }
}

/// Run a blocking closure on the blocking pool, giving up after `deadline`.
///
/// The agent's own timeouts bound the worker thread, so a timed-out wait does
/// not leak an unbounded request.
pub async fn run_blocking<T, F>(deadline: Duration, f: F) -> Result<T, BlockingFailure>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(deadline, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_err)) => Err(BlockingFailure::Aborted(join_err.to_string())),
        Err(_) => Err(BlockingFailure::TimedOut(deadline)),
    }
}
