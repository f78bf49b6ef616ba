//! Sui JSON-RPC client.
//!
//! Read-only queries the reconciliation core needs from a fullnode:
//! - owned objects of one struct type (`suix_getOwnedObjects`, paginated)
//! - a single object by id (`sui_getObject`)
//! - the transaction that created an object (`suix_queryTransactionBlocks`)
//!
//! Raw object JSON is returned untouched; decoding belongs to the caller,
//! which must tolerate historical field spellings.
//!
//! ## Pagination
//!
//! `suix_getOwnedObjects` pages with an opaque cursor. [`PageInfo`] carries
//! `hasNextPage` / `nextCursor`; pages are fetched until exhausted or until
//! [`MAX_PAGES`] is reached. A listing cut short by the page limit comes back
//! with [`OwnedObjects::truncated`] set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::http::{run_blocking, BlockingFailure, HttpTransport, UreqTransport};

/// Maximum items per page (fullnode limit).
pub const MAX_PAGE_SIZE: usize = 50;
/// Hard stop on pages fetched for one owner.
pub const MAX_PAGES: usize = 40;

/// Errors from a ledger query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerQueryError {
    /// No HTTP status was received.
    Transport(String),
    /// The fullnode answered with a non-success HTTP status.
    Http { status: u16, body: String },
    /// JSON-RPC level error object.
    Rpc { code: i64, message: String },
    /// The request deadline elapsed.
    Timeout(Duration),
    /// The response was not the JSON-RPC shape we asked for.
    InvalidResponse(String),
}

impl LedgerQueryError {
    /// Transient failures worth offering a retry for.
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerQueryError::Transport(_) | LedgerQueryError::Timeout(_) => true,
            LedgerQueryError::Http { status, .. } => *status == 429 || *status >= 500,
            LedgerQueryError::Rpc { .. } | LedgerQueryError::InvalidResponse(_) => false,
        }
    }
}

impl std::fmt::Display for LedgerQueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerQueryError::Transport(msg) => write!(f, "ledger request failed: {}", msg),
            LedgerQueryError::Http { status, body } => {
                write!(f, "ledger returned HTTP {}: {}", status, body)
            }
            LedgerQueryError::Rpc { code, message } => {
                write!(f, "ledger RPC error {}: {}", code, message)
            }
            LedgerQueryError::Timeout(d) => {
                write!(f, "ledger request timed out after {}s", d.as_secs())
            }
            LedgerQueryError::InvalidResponse(msg) => {
                write!(f, "unexpected ledger response: {}", msg)
            }
        }
    }
}

impl std::error::Error for LedgerQueryError {}

/// Raw owned objects of one struct type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnedObjects {
    pub objects: Vec<Value>,
    /// More pages existed past [`MAX_PAGES`]; `objects` is a prefix.
    pub truncated: bool,
}

impl OwnedObjects {
    pub fn complete(objects: Vec<Value>) -> Self {
        Self {
            objects,
            truncated: false,
        }
    }
}

/// Cursor-based pagination info from a JSON-RPC page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub next_cursor: Option<String>,
}

impl PageInfo {
    /// Parse PageInfo from a JSON-RPC page result.
    pub fn from_value(value: &Value) -> Self {
        Self {
            has_next_page: value
                .get("hasNextPage")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            next_cursor: value
                .get("nextCursor")
                .and_then(Value::as_str)
                .map(String::from),
        }
    }
}

/// JSON-RPC client for a Sui fullnode.
#[derive(Clone)]
pub struct SuiRpcClient {
    endpoint: String,
    transport: Arc<dyn HttpTransport>,
    request_deadline: Duration,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for SuiRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuiRpcClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl SuiRpcClient {
    /// Create a client with the default `ureq` transport.
    pub fn new(endpoint: &str) -> Self {
        let transport = UreqTransport::from_env();
        let deadline = transport.timeout() + Duration::from_secs(5);
        Self::with_transport(endpoint, Arc::new(transport)).with_request_deadline(deadline)
    }

    /// Create a client over an explicit transport.
    pub fn with_transport(endpoint: &str, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            transport,
            request_deadline: Duration::from_secs(35),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn with_request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = deadline;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute one JSON-RPC call and return its `result`.
    async fn call(&self, method: &str, params: Value) -> Result<Value, LedgerQueryError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "JSON-RPC call");

        let transport = self.transport.clone();
        let endpoint = self.endpoint.clone();
        let reply = run_blocking(self.request_deadline, move || {
            transport.post_json(&endpoint, &body)
        })
        .await
        .map_err(|failure| match failure {
            BlockingFailure::TimedOut(d) => LedgerQueryError::Timeout(d),
            BlockingFailure::Aborted(msg) => LedgerQueryError::Transport(msg),
        })?
        .map_err(|e| LedgerQueryError::Transport(e.to_string()))?;

        if !reply.is_success() {
            return Err(LedgerQueryError::Http {
                status: reply.status,
                body: reply.body_preview(),
            });
        }

        let response: Value = serde_json::from_slice(&reply.body)
            .map_err(|e| LedgerQueryError::InvalidResponse(format!("{}: {}", method, e)))?;

        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            return Err(LedgerQueryError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or(-1),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }

        response
            .get("result")
            .cloned()
            .ok_or_else(|| LedgerQueryError::InvalidResponse(format!("{}: no result", method)))
    }

    /// All objects of `struct_type` owned by `owner`, as raw JSON-RPC object responses.
    pub async fn get_owned_objects(
        &self,
        owner: &str,
        struct_type: &str,
    ) -> Result<OwnedObjects, LedgerQueryError> {
        let mut objects = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 0..MAX_PAGES {
            let params = json!([
                owner,
                {
                    "filter": { "StructType": struct_type },
                    "options": { "showContent": true, "showType": true, "showOwner": true },
                },
                cursor,
                MAX_PAGE_SIZE,
            ]);
            let result = self.call("suix_getOwnedObjects", params).await?;
            let data = result
                .get("data")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    LedgerQueryError::InvalidResponse("suix_getOwnedObjects: missing data".into())
                })?;
            objects.extend(data.iter().cloned());

            let info = PageInfo::from_value(&result);
            match (info.has_next_page, info.next_cursor) {
                (true, Some(next)) if !data.is_empty() => cursor = Some(next),
                _ => {
                    debug!(owner, pages = page + 1, objects = objects.len(), "owned objects fetched");
                    return Ok(OwnedObjects::complete(objects));
                }
            }
        }

        warn!(owner, max_pages = MAX_PAGES, "stopped paginating owned objects at page limit");
        Ok(OwnedObjects {
            objects,
            truncated: true,
        })
    }

    /// A single object by id. `Ok(None)` when the fullnode reports it does not exist.
    pub async fn get_object(&self, object_id: &str) -> Result<Option<Value>, LedgerQueryError> {
        let params = json!([
            object_id,
            { "showContent": true, "showType": true, "showOwner": true },
        ]);
        let result = self.call("sui_getObject", params).await?;
        if result.get("data").map_or(true, Value::is_null) {
            debug!(object_id, error = ?result.get("error"), "object not found");
            return Ok(None);
        }
        Ok(Some(result))
    }

    /// Digest of the earliest transaction that changed (created) the object.
    pub async fn find_creating_transaction(
        &self,
        object_id: &str,
    ) -> Result<Option<String>, LedgerQueryError> {
        let params = json!([
            { "filter": { "ChangedObject": object_id }, "options": {} },
            Value::Null,
            1,
            false,
        ]);
        let result = self.call("suix_queryTransactionBlocks", params).await?;
        Ok(result
            .get("data")
            .and_then(Value::as_array)
            .and_then(|txs| txs.first())
            .and_then(|tx| tx.get("digest"))
            .and_then(Value::as_str)
            .map(String::from))
    }
}
