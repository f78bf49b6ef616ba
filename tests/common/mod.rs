#![allow(dead_code)]
//! In-memory ledger, Walrus and submitter doubles for session tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Notify;

use vitae_cache::{HiddenSet, KeyValueStore, MemoryBlobCache, MemoryKeyValueStore};
use vitae_reconcile::{
    BlobResolver, CredentialLocator, LedgerSource, ReconcileSession, TransactionSubmitter,
};
use vitae_transport::{
    HttpReply, HttpTransport, LedgerQueryError, OwnedObjects, TransportError, WalrusClient,
};
use vitae_types::{CredentialDescriptor, IssueCredentialCall};

pub const STRUCT_TYPE: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000aa::certificate::Diploma";
pub const PUBLISHER_A: &str = "http://publisher-a.test";
pub const PUBLISHER_B: &str = "http://publisher-b.test";
pub const AGGREGATOR: &str = "http://aggregator.test";

/// Full-width object id / address for `n`.
pub fn addr(n: u64) -> String {
    format!("0x{:064x}", n)
}

/// A raw `sui_getObject`-style credential object.
pub fn raw_credential(id: &str, owner: &str, fields: Value) -> Value {
    json!({
        "data": {
            "objectId": id,
            "type": STRUCT_TYPE,
            "owner": { "AddressOwner": owner },
            "content": { "dataType": "moveObject", "fields": fields }
        }
    })
}

#[derive(Default)]
pub struct FakeLedger {
    owned: Mutex<HashMap<String, Vec<Value>>>,
    transactions: Mutex<HashMap<String, String>>,
    owned_calls: AtomicUsize,
    object_calls: AtomicUsize,
    /// Report every listing as cut short by the page limit.
    truncated: AtomicBool,
    /// When set, the first owned-objects call parks until notified.
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeLedger {
    pub fn add(&self, owner: &str, raw: Value) {
        self.owned.lock().entry(owner.to_string()).or_default().push(raw);
    }

    pub fn set_creating_transaction(&self, object_id: &str, digest: &str) {
        self.transactions
            .lock()
            .insert(object_id.to_string(), digest.to_string());
    }

    pub fn truncate_listings(&self) {
        self.truncated.store(true, Ordering::SeqCst);
    }

    pub fn park_first_listing(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn owned_calls(&self) -> usize {
        self.owned_calls.load(Ordering::SeqCst)
    }

    pub fn object_calls(&self) -> usize {
        self.object_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerSource for FakeLedger {
    async fn owned_objects(
        &self,
        owner: &str,
        _struct_type: &str,
    ) -> Result<OwnedObjects, LedgerQueryError> {
        self.owned_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(OwnedObjects {
            objects: self.owned.lock().get(owner).cloned().unwrap_or_default(),
            truncated: self.truncated.load(Ordering::SeqCst),
        })
    }

    async fn object(&self, object_id: &str) -> Result<Option<Value>, LedgerQueryError> {
        self.object_calls.fetch_add(1, Ordering::SeqCst);
        let owned = self.owned.lock();
        Ok(owned
            .values()
            .flatten()
            .find(|raw| raw.pointer("/data/objectId").and_then(Value::as_str) == Some(object_id))
            .cloned())
    }

    async fn creating_transaction(
        &self,
        object_id: &str,
    ) -> Result<Option<String>, LedgerQueryError> {
        match self.transactions.lock().get(object_id) {
            Some(digest) => Ok(Some(digest.clone())),
            None => Err(LedgerQueryError::Rpc {
                code: -32602,
                message: format!("no transactions for {}", object_id),
            }),
        }
    }
}

/// Walrus publishers and aggregator backed by a map.
#[derive(Default)]
pub struct MemoryWalrus {
    blobs: Mutex<HashMap<String, (Vec<u8>, String)>>,
    down_publishers: Mutex<Vec<String>>,
    puts: Mutex<Vec<String>>,
    gets: AtomicUsize,
}

impl MemoryWalrus {
    pub fn take_down(&self, publisher: &str) {
        self.down_publishers.lock().push(publisher.to_string());
    }

    pub fn store(&self, blob_id: &str, bytes: &[u8], content_type: &str) {
        self.blobs
            .lock()
            .insert(blob_id.to_string(), (bytes.to_vec(), content_type.to_string()));
    }

    pub fn put_urls(&self) -> Vec<String> {
        self.puts.lock().clone()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

impl HttpTransport for MemoryWalrus {
    fn get(&self, url: &str) -> Result<HttpReply, TransportError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let blob_id = url.rsplit('/').next().unwrap_or_default();
        match self.blobs.lock().get(blob_id) {
            Some((bytes, content_type)) => Ok(HttpReply {
                status: 200,
                content_type: Some(content_type.clone()),
                content_disposition: None,
                body: bytes.clone(),
            }),
            None => Ok(HttpReply {
                status: 404,
                body: b"blob not found".to_vec(),
                ..Default::default()
            }),
        }
    }

    fn put(&self, url: &str, body: &[u8], content_type: &str) -> Result<HttpReply, TransportError> {
        self.puts.lock().push(url.to_string());
        if self
            .down_publishers
            .lock()
            .iter()
            .any(|p| url.starts_with(p.as_str()))
        {
            return Err(TransportError("connection refused".to_string()));
        }
        let blob_id = format!("blob-{}", self.blobs.lock().len() + 1);
        self.store(&blob_id, body, content_type);
        Ok(HttpReply {
            status: 200,
            content_type: Some("application/json".to_string()),
            content_disposition: None,
            body: json!({ "newlyCreated": { "blobObject": { "blobId": blob_id } } })
                .to_string()
                .into_bytes(),
        })
    }

    fn post_json(&self, _url: &str, _body: &Value) -> Result<HttpReply, TransportError> {
        Err(TransportError("not a JSON-RPC endpoint".to_string()))
    }
}

/// Submitter that "executes" the issue call by adding the object to the ledger.
pub struct LedgerSubmitter {
    pub ledger: Arc<FakeLedger>,
    pub calls: Mutex<Vec<IssueCredentialCall>>,
    pub reject: bool,
}

impl LedgerSubmitter {
    pub fn new(ledger: Arc<FakeLedger>) -> Self {
        Self {
            ledger,
            calls: Mutex::new(Vec::new()),
            reject: false,
        }
    }
}

#[async_trait]
impl TransactionSubmitter for LedgerSubmitter {
    async fn submit_issue_credential(&self, call: &IssueCredentialCall) -> anyhow::Result<String> {
        self.calls.lock().push(call.clone());
        if self.reject {
            anyhow::bail!("user rejected the transaction");
        }
        let n = self.calls.lock().len() as u64;
        let object_id = addr(0x1000 + n);
        self.ledger.add(
            &call.owner,
            raw_credential(
                &object_id,
                &call.owner,
                json!({
                    "course_name": call.title,
                    "issuer_name": call.issuer,
                    "blob_id": call.content_address,
                    "issue_date": call.timestamp_ms.to_string(),
                    "score": call.score,
                }),
            ),
        );
        let digest = format!("Digest{}", n);
        self.ledger.set_creating_transaction(&object_id, &digest);
        Ok(digest)
    }
}

/// Everything a session test needs, wired over in-memory stores.
pub struct Harness {
    pub ledger: Arc<FakeLedger>,
    pub walrus: Arc<MemoryWalrus>,
    pub cache: Arc<MemoryBlobCache>,
    pub store: Arc<dyn KeyValueStore>,
    pub hidden: Arc<HiddenSet>,
}

impl Harness {
    pub fn new() -> Self {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let hidden = Arc::new(HiddenSet::load(store.clone()).unwrap());
        Self {
            ledger: Arc::new(FakeLedger::default()),
            walrus: Arc::new(MemoryWalrus::default()),
            cache: Arc::new(MemoryBlobCache::new()),
            store,
            hidden,
        }
    }

    pub fn walrus_client(&self) -> WalrusClient {
        WalrusClient::new(
            vec![PUBLISHER_A.to_string(), PUBLISHER_B.to_string()],
            AGGREGATOR.to_string(),
            self.walrus.clone(),
        )
    }

    pub fn session(&self, descriptors: Vec<CredentialDescriptor>) -> ReconcileSession {
        let locator = CredentialLocator::new(self.ledger.clone(), STRUCT_TYPE);
        let resolver = BlobResolver::new(self.walrus_client(), self.cache.clone());
        ReconcileSession::new(descriptors, locator, resolver, self.hidden.clone())
    }
}
