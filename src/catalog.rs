//! Credential catalog loading.
//!
//! The catalog is a JSON array of descriptors:
//!
//! ```json
//! [{ "id": "3", "title": "Git Expert", "issuer": "CertHub Academy", "templateImageRef": "images/git-expert.png" }]
//! ```
//!
//! Order matters: it breaks ties during matching.

use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;
use vitae_types::CredentialDescriptor;

const BUILTIN_CATALOG: &str = include_str!("../catalog/credentials.json");

/// The catalog shipped with the binary.
pub fn builtin_catalog() -> Result<Vec<CredentialDescriptor>> {
    parse_catalog(BUILTIN_CATALOG).context("built-in catalog")
}

/// Load a catalog file, or the built-in catalog when `path` is `None`.
pub fn load_catalog(path: Option<&Path>) -> Result<Vec<CredentialDescriptor>> {
    let Some(path) = path else {
        return builtin_catalog();
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read catalog {}", path.display()))?;
    parse_catalog(&raw).with_context(|| format!("parse catalog {}", path.display()))
}

/// Parse and validate catalog JSON. Ids must be unique and non-blank.
pub fn parse_catalog(raw: &str) -> Result<Vec<CredentialDescriptor>> {
    let descriptors: Vec<CredentialDescriptor> = serde_json::from_str(raw)?;
    let mut seen = HashSet::new();
    for descriptor in &descriptors {
        if descriptor.id.trim().is_empty() {
            return Err(anyhow!("descriptor '{}' has a blank id", descriptor.title));
        }
        if !seen.insert(descriptor.id.as_str()) {
            return Err(anyhow!("duplicate descriptor id '{}'", descriptor.id));
        }
        if descriptor.title.trim().is_empty() {
            warn!(id = %descriptor.id, "descriptor has a blank title and will never match");
        }
    }
    Ok(descriptors)
}
