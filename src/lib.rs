//! vitae: credential reconciliation and blob caching for a Sui wallet.
//!
//! Pairs a local catalog of credential templates with the `Diploma` objects an
//! address owns on Sui, and fetches the credential files from Walrus through a
//! local cache.
//!
//! - [`catalog`]: load the descriptor catalog
//! - [`config`]: `VITAE_*` configuration and store wiring
//!
//! The building blocks live in the workspace crates and are re-exported here:
//! [`vitae_types`], [`vitae_transport`], [`vitae_cache`], [`vitae_reconcile`].

pub mod catalog;
pub mod config;

pub use catalog::{builtin_catalog, load_catalog};
pub use config::VitaeConfig;

pub use vitae_cache;
pub use vitae_reconcile;
pub use vitae_transport;
pub use vitae_types;
