//! vitae: reconcile a wallet's Sui credentials against the local catalog.
//!
//! ## Example Usage
//!
//! ```bash
//! # Which catalog credentials does this address hold?
//! vitae list --owner 0x7a1c...
//!
//! # Upload a certificate file to Walrus
//! vitae upload ./git-expert.pdf
//!
//! # Fetch a credential file (cache first)
//! vitae download M4hsZGQ1oCktdzegB6HnI6Mi28S2nqOPHxK-W7_4BUk --title "Git Expert"
//!
//! # Hide a credential from listings
//! vitae hide 0x9f3e...
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vitae::catalog::load_catalog;
use vitae::config::VitaeConfig;
use vitae_reconcile::{PassOutcome, ReconcileReport, VerifyHint};
use vitae_transport::{download_file_name, mime_from_file_name, NetworkEndpoints};

#[derive(Parser)]
#[command(
    name = "vitae",
    version,
    about = "Credential reconciliation and Walrus blob caching for Sui wallets"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Local state directory (blob cache, hidden set) [env: VITAE_STATE_DIR]
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Descriptor catalog JSON (default: built-in catalog)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Network defaults to use (mainnet, testnet, devnet) [env: VITAE_NETWORK]
    #[arg(long, global = true)]
    network: Option<String>,

    /// Sui JSON-RPC endpoint [env: VITAE_RPC_URL]
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile an owner's credential objects with the catalog
    List {
        #[arg(long)]
        owner: String,
        /// Include hidden credentials
        #[arg(long)]
        all: bool,
        /// Skip the per-credential transaction lookup
        #[arg(long)]
        no_tx: bool,
    },

    /// Verify one catalog credential on the ledger
    Verify {
        #[arg(long)]
        owner: String,
        /// Catalog descriptor id
        #[arg(long)]
        credential: String,
        /// Known object id (skips the owner-wide scan when it still exists)
        #[arg(long)]
        object_id: Option<String>,
    },

    /// Upload a file to Walrus and print its blob id
    Upload {
        file: PathBuf,
        /// Content type (default: from the file extension)
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Download a blob (cache first) into a file
    Download {
        blob_id: String,
        /// Credential title used for the file name
        #[arg(long)]
        title: Option<String>,
        /// Output directory
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Hide a credential object from listings
    Hide { object_id: String },

    /// Show a hidden credential object again
    Unhide { object_id: String },

    /// List hidden credential object ids
    Hidden,

    /// Unhide every credential
    ClearHidden,

    /// Evict oldest cached blobs until the cache fits its budget
    CachePrune,

    /// Print the descriptor catalog
    Catalog,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vitae=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let Cli {
        command,
        state_dir,
        catalog,
        network,
        rpc_url,
        json,
    } = Cli::parse();

    let mut config = VitaeConfig::from_env();
    if let Some(dir) = state_dir {
        config.state_dir = dir;
    }
    if let Some(network) = network {
        config.endpoints = NetworkEndpoints::for_network(&network);
    }
    if let Some(url) = rpc_url {
        config.endpoints.rpc_url = url;
    }

    match command {
        Commands::List { owner, all, no_tx } => {
            let descriptors = load_catalog(catalog.as_deref())?;
            let session = config
                .open_session(descriptors)?
                .with_transaction_lookup(!no_tx);
            let report = match session.reconcile(&owner).await? {
                PassOutcome::Completed(report) => report,
                PassOutcome::Superseded => return Err(anyhow!("reconciliation pass superseded")),
            };
            print_report(&config, &session, &report, all, json)
        }
        Commands::Verify {
            owner,
            credential,
            object_id,
        } => {
            let descriptors = load_catalog(catalog.as_deref())?;
            let session = config.open_session(descriptors)?;
            let hint = VerifyHint {
                object_id,
                content_address: None,
            };
            let state = session.verify_credential(&owner, &credential, hint).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                println!("{}: {:?}", credential, state);
            }
            Ok(())
        }
        Commands::Upload { file, content_type } => {
            let bytes = std::fs::read(&file).with_context(|| format!("read {}", file.display()))?;
            let content_type = content_type.or_else(|| {
                file.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(mime_from_file_name)
                    .map(String::from)
            });
            let blob_id = config
                .walrus()
                .upload(bytes, content_type.as_deref())
                .await?;
            if json {
                println!("{}", json!({ "blobId": blob_id }));
            } else {
                println!("{}", blob_id);
            }
            Ok(())
        }
        Commands::Download {
            blob_id,
            title,
            out_dir,
        } => {
            let resolver = config.blob_resolver()?;
            let blob = resolver.resolve(&blob_id).await?;
            let name = download_file_name(title.as_deref().unwrap_or(&blob_id), blob.kind);
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("create {}", out_dir.display()))?;
            let path = out_dir.join(name);
            std::fs::write(&path, &blob.bytes)
                .with_context(|| format!("write {}", path.display()))?;
            if json {
                println!(
                    "{}",
                    json!({
                        "path": path.display().to_string(),
                        "kind": blob.kind,
                        "contentType": blob.content_type,
                        "size": blob.bytes.len(),
                        "fromCache": blob.from_cache,
                    })
                );
            } else {
                let source = if blob.from_cache { "cache" } else { "walrus" };
                println!("{} ({}, {} bytes, from {})", path.display(), blob.kind, blob.bytes.len(), source);
            }
            Ok(())
        }
        Commands::Hide { object_id } => {
            let hidden = config.open_hidden_set()?;
            let changed = hidden.hide(&object_id)?;
            print_hidden_change("hidden", &object_id, changed, json);
            Ok(())
        }
        Commands::Unhide { object_id } => {
            let hidden = config.open_hidden_set()?;
            let changed = hidden.unhide(&object_id)?;
            print_hidden_change("unhidden", &object_id, changed, json);
            Ok(())
        }
        Commands::Hidden => {
            let ids = config.open_hidden_set()?.ids();
            if json {
                println!("{}", serde_json::to_string_pretty(&ids)?);
            } else if ids.is_empty() {
                println!("No hidden credentials");
            } else {
                for id in ids {
                    println!("{}", id);
                }
            }
            Ok(())
        }
        Commands::ClearHidden => {
            let removed = config.open_hidden_set()?.clear_all()?;
            if json {
                println!("{}", json!({ "cleared": removed }));
            } else {
                println!("Cleared {} hidden credential(s)", removed);
            }
            Ok(())
        }
        Commands::CachePrune => {
            let cache = config.open_blob_cache(Default::default())?;
            let report = cache.prune()?;
            if json {
                println!(
                    "{}",
                    json!({
                        "evicted": report.evicted,
                        "freedBytes": report.freed_bytes,
                        "remainingBytes": report.remaining_bytes,
                        "budgetBytes": config.cache_max_bytes,
                    })
                );
            } else {
                println!(
                    "Evicted {} blob(s), freed {} bytes, {} of {} bytes in use",
                    report.evicted.len(),
                    report.freed_bytes,
                    report.remaining_bytes,
                    config.cache_max_bytes
                );
            }
            Ok(())
        }
        Commands::Catalog => {
            let descriptors = load_catalog(catalog.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&descriptors)?);
            } else {
                for d in descriptors {
                    println!("{:>4}  {}  ({})", d.id, d.title, d.issuer);
                }
            }
            Ok(())
        }
    }
}

fn print_hidden_change(verb: &str, object_id: &str, changed: bool, json: bool) {
    if json {
        println!("{}", json!({ "objectId": object_id.trim(), "changed": changed }));
    } else if changed {
        println!("{} {}", verb, object_id.trim());
    } else {
        println!("{} already {}", object_id.trim(), verb);
    }
}

fn print_report(
    config: &VitaeConfig,
    session: &vitae_reconcile::ReconcileSession,
    report: &ReconcileReport,
    include_hidden: bool,
    json: bool,
) -> Result<()> {
    let records: Vec<_> = if include_hidden {
        report.records.iter().collect()
    } else {
        report.visible(session.hidden())
    };

    if json {
        let out = json!({
            "owner": report.owner,
            "records": records,
            "unmatched": report.unmatched,
            "failures": report.failures.iter().map(|f| json!({
                "objectId": f.object_id,
                "stage": f.stage.to_string(),
                "message": f.message,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Owner {}", report.owner);
    if records.is_empty() {
        println!("No catalog credentials found on the ledger");
    }
    for record in &records {
        let title = session
            .descriptor(&record.descriptor_id)
            .map(|d| d.title.as_str())
            .unwrap_or(record.descriptor_id.as_str());
        println!("  {} [{}]", title, record.tier);
        println!("    object   {}", record.object_id);
        if record.has_file() {
            println!("    file     {}", config.walrus().blob_url(&record.content_address));
        }
        if let Some(tx) = &record.transaction_id {
            println!("    tx       {}", config.endpoints.explorer_tx_url(tx));
        }
    }
    if !report.unmatched.is_empty() {
        println!("{} ledger object(s) matched no catalog entry", report.unmatched.len());
    }
    for failure in &report.failures {
        println!(
            "  warning: {} failed for {}: {}",
            failure.stage,
            failure.object_id.as_deref().unwrap_or("<unknown>"),
            failure.message
        );
    }
    Ok(())
}
