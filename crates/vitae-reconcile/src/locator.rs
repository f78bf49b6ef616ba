//! Ledger object locator.
//!
//! Lists the credential objects an address owns and decodes each raw JSON-RPC
//! object into a [`LedgerCredentialObject`]. Credential objects minted by
//! different contract revisions spell their fields differently, so every
//! field is read through an ordered alias list; the first alias carrying a
//! usable value wins.
//!
//! Decoding is per object: one malformed object is skipped and reported
//! without failing the listing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use vitae_transport::{LedgerQueryError, OwnedObjects, SuiRpcClient};
use vitae_types::{normalize_address, LedgerCredentialObject};

use crate::errors::{ParseError, ReconcileError};

pub const TITLE_ALIASES: &[&str] = &["course_name", "title", "name", "courseName"];
pub const ISSUER_ALIASES: &[&str] = &["issuer_name", "issuer", "issuerName"];
pub const CONTENT_ADDRESS_ALIASES: &[&str] = &["blob_id", "blobId", "image_url", "imageUrl"];
pub const TIMESTAMP_ALIASES: &[&str] = &["issue_date", "issueDate", "date", "minted_at", "mintedAt"];
pub const RECIPIENT_ALIASES: &[&str] = &["recipient"];

/// Read-only ledger queries the locator and matcher need.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Raw objects of `struct_type` owned by `owner`, every page up to the source's limit.
    async fn owned_objects(
        &self,
        owner: &str,
        struct_type: &str,
    ) -> Result<OwnedObjects, LedgerQueryError>;

    /// Raw object by id, `None` if it does not exist.
    async fn object(&self, object_id: &str) -> Result<Option<Value>, LedgerQueryError>;

    /// Digest of the transaction that created the object.
    async fn creating_transaction(
        &self,
        object_id: &str,
    ) -> Result<Option<String>, LedgerQueryError>;
}

#[async_trait]
impl LedgerSource for SuiRpcClient {
    async fn owned_objects(
        &self,
        owner: &str,
        struct_type: &str,
    ) -> Result<OwnedObjects, LedgerQueryError> {
        self.get_owned_objects(owner, struct_type).await
    }

    async fn object(&self, object_id: &str) -> Result<Option<Value>, LedgerQueryError> {
        self.get_object(object_id).await
    }

    async fn creating_transaction(
        &self,
        object_id: &str,
    ) -> Result<Option<String>, LedgerQueryError> {
        self.find_creating_transaction(object_id).await
    }
}

/// An object the locator could not decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedObject {
    pub object_id: Option<String>,
    pub error: ParseError,
}

/// Result of listing one owner's credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocatorReport {
    pub objects: Vec<LedgerCredentialObject>,
    pub skipped: Vec<SkippedObject>,
    /// The ledger stopped paging early; `objects` is partial.
    pub truncated: bool,
}

/// Finds credential objects of one Move struct type.
#[derive(Clone)]
pub struct CredentialLocator {
    source: Arc<dyn LedgerSource>,
    struct_type: String,
}

impl CredentialLocator {
    pub fn new(source: Arc<dyn LedgerSource>, struct_type: impl Into<String>) -> Self {
        Self {
            source,
            struct_type: struct_type.into(),
        }
    }

    pub fn struct_type(&self) -> &str {
        &self.struct_type
    }

    pub fn source(&self) -> &Arc<dyn LedgerSource> {
        &self.source
    }

    /// Every credential object owned by `owner`. A missing or blank owner yields an empty report.
    pub async fn list_owned_credentials(
        &self,
        owner: Option<&str>,
    ) -> Result<LocatorReport, LedgerQueryError> {
        let Some(owner) = owner.map(str::trim).filter(|o| !o.is_empty()) else {
            return Ok(LocatorReport::default());
        };
        let owner = normalize_address(owner);

        let raw = self.source.owned_objects(&owner, &self.struct_type).await?;
        let mut report = LocatorReport {
            truncated: raw.truncated,
            ..Default::default()
        };
        for value in &raw.objects {
            match decode_credential_object(value, Some(&owner)) {
                Ok(object) => report.objects.push(object),
                Err(error) => {
                    let object_id = raw_object_id(value);
                    warn!(
                        owner = %owner,
                        object_id = object_id.as_deref().unwrap_or("<unknown>"),
                        error = %error,
                        "skipping undecodable credential object"
                    );
                    report.skipped.push(SkippedObject { object_id, error });
                }
            }
        }
        debug!(
            owner = %owner,
            decoded = report.objects.len(),
            skipped = report.skipped.len(),
            truncated = report.truncated,
            "listed owned credentials"
        );
        Ok(report)
    }

    /// One credential object by id.
    ///
    /// `Ok(None)` when the object does not exist or is not of this locator's struct type.
    pub async fn get_credential(
        &self,
        object_id: &str,
    ) -> Result<Option<LedgerCredentialObject>, ReconcileError> {
        let object_id = normalize_address(object_id);
        let Some(raw) = self.source.object(&object_id).await? else {
            return Ok(None);
        };

        if let Some(actual) = raw.pointer("/data/type").and_then(Value::as_str) {
            if !same_struct_type(actual, &self.struct_type) {
                warn!(object_id = %object_id, actual, expected = %self.struct_type, "object is not a credential");
                return Ok(None);
            }
        }

        decode_credential_object(&raw, None)
            .map(Some)
            .map_err(|error| ReconcileError::Parse {
                object_id: Some(object_id),
                error,
            })
    }
}

/// Decode one raw JSON-RPC object response.
///
/// `queried_owner` is the last-resort owner when the object names no recipient
/// and is not address-owned.
pub fn decode_credential_object(
    raw: &Value,
    queried_owner: Option<&str>,
) -> Result<LedgerCredentialObject, ParseError> {
    let data = raw
        .get("data")
        .and_then(Value::as_object)
        .ok_or(ParseError::MissingData)?;

    let object_id = match data.get("objectId") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
        Some(Value::String(_)) | Some(Value::Null) | None => {
            return Err(ParseError::MissingObjectId)
        }
        Some(_) => {
            return Err(ParseError::Malformed {
                field: "objectId".to_string(),
                expected: "string",
            })
        }
    };

    let fields = data
        .get("content")
        .and_then(|c| c.get("fields"))
        .and_then(Value::as_object)
        .ok_or(ParseError::MissingFields)?;

    let title = text_field(fields, TITLE_ALIASES)?;
    let issuer = text_field(fields, ISSUER_ALIASES)?;
    let content_address = text_field(fields, CONTENT_ADDRESS_ALIASES)?;
    let issue_timestamp = timestamp_field(fields, TIMESTAMP_ALIASES, &object_id)?;

    let owner_address = text_field(fields, RECIPIENT_ALIASES)?
        .or_else(|| {
            data.get("owner")
                .and_then(|o| o.get("AddressOwner"))
                .and_then(Value::as_str)
                .map(String::from)
        })
        .or_else(|| queried_owner.map(String::from))
        .map(|owner| normalize_address(&owner))
        .unwrap_or_default();

    Ok(LedgerCredentialObject {
        object_id,
        title,
        issuer,
        content_address,
        issue_timestamp,
        owner_address,
    })
}

/// First alias carrying a non-blank string (numbers rendered as decimal).
fn text_field(
    fields: &Map<String, Value>,
    aliases: &[&str],
) -> Result<Option<String>, ParseError> {
    for alias in aliases {
        match fields.get(*alias) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    return Ok(Some(trimmed.to_string()));
                }
            }
            Some(Value::Number(n)) => return Ok(Some(n.to_string())),
            Some(_) => {
                return Err(ParseError::Malformed {
                    field: alias.to_string(),
                    expected: "string",
                })
            }
        }
    }
    Ok(None)
}

/// First alias carrying a parseable timestamp, in milliseconds.
fn timestamp_field(
    fields: &Map<String, Value>,
    aliases: &[&str],
    object_id: &str,
) -> Result<Option<u64>, ParseError> {
    for alias in aliases {
        match fields.get(*alias) {
            None | Some(Value::Null) => continue,
            Some(Value::Number(n)) => match n.as_u64() {
                Some(ms) => return Ok(Some(ms)),
                None => {
                    return Err(ParseError::Malformed {
                        field: alias.to_string(),
                        expected: "non-negative integer",
                    })
                }
            },
            Some(Value::String(s)) => {
                if let Some(ms) = parse_timestamp(s) {
                    return Ok(Some(ms));
                }
                if !s.trim().is_empty() {
                    debug!(object_id, field = *alias, value = %s, "ignoring unparseable timestamp");
                }
            }
            Some(_) => {
                return Err(ParseError::Malformed {
                    field: alias.to_string(),
                    expected: "timestamp",
                })
            }
        }
    }
    Ok(None)
}

/// Milliseconds from a decimal string, an RFC 3339 timestamp or a `YYYY-MM-DD` date.
pub fn parse_timestamp(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(ms) = value.parse::<u64>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return u64::try_from(dt.timestamp_millis()).ok();
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let ms = date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis();
        return u64::try_from(ms).ok();
    }
    None
}

fn raw_object_id(raw: &Value) -> Option<String> {
    raw.pointer("/data/objectId")
        .and_then(Value::as_str)
        .map(String::from)
}

/// Compare `pkg::module::Name` strings with the package address normalized.
fn same_struct_type(a: &str, b: &str) -> bool {
    fn split(t: &str) -> Option<(String, &str)> {
        let (pkg, rest) = t.trim().split_once("::")?;
        Some((normalize_address(pkg), rest))
    }
    match (split(a), split(b)) {
        (Some((pa, ra)), Some((pb, rb))) => pa == pb && ra == rb,
        _ => a == b,
    }
}
