//! Network endpoint resolution.
//!
//! Defaults follow the public Sui fullnodes and Walrus testnet services; every
//! endpoint can be overridden through `VITAE_*` environment variables.

use vitae_types::{env_list, env_string_or, env_var_or};

use crate::walrus::DEFAULT_EPOCHS;

const MAINNET_RPC: &str = "https://fullnode.mainnet.sui.io:443";
const TESTNET_RPC: &str = "https://fullnode.testnet.sui.io:443";
const DEVNET_RPC: &str = "https://fullnode.devnet.sui.io:443";

const WALRUS_TESTNET_PUBLISHER: &str = "https://publisher.walrus-testnet.walrus.space";
const WALRUS_TESTNET_AGGREGATOR: &str = "https://aggregator.walrus-testnet.walrus.space";
const WALRUS_MAINNET_AGGREGATOR: &str = "https://aggregator.walrus-mainnet.walrus.space";

/// Diploma package deployed on testnet.
pub const DEFAULT_PACKAGE_ID: &str =
    "0x451fcbe7c9d77678bfcebb44498d84505a122fec34d43b93fb734c5de216871d";
/// Move module holding the `Diploma` struct and `issue_diploma` entry function.
pub const DEFAULT_MODULE: &str = "diploma";
/// Struct name of a credential object.
pub const CREDENTIAL_STRUCT: &str = "Diploma";

/// Every endpoint the core talks to, resolved for one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEndpoints {
    pub network: String,
    pub rpc_url: String,
    /// Walrus publishers in failover order.
    pub publishers: Vec<String>,
    pub aggregator: String,
    pub epochs: u32,
    pub package_id: String,
    pub module: String,
}

impl NetworkEndpoints {
    pub fn testnet() -> Self {
        Self::for_network("testnet")
    }

    pub fn mainnet() -> Self {
        Self::for_network("mainnet")
    }

    /// Built-in defaults for a network name. Unknown names resolve to testnet.
    ///
    /// Mainnet has no public publisher; uploads need `VITAE_WALRUS_PUBLISHERS`.
    pub fn for_network(network: &str) -> Self {
        let network = network.trim().to_lowercase();
        let (rpc, publishers, aggregator) = match network.as_str() {
            "mainnet" => (MAINNET_RPC, vec![], WALRUS_MAINNET_AGGREGATOR),
            "devnet" => (
                DEVNET_RPC,
                vec![WALRUS_TESTNET_PUBLISHER.to_string()],
                WALRUS_TESTNET_AGGREGATOR,
            ),
            _ => (
                TESTNET_RPC,
                vec![WALRUS_TESTNET_PUBLISHER.to_string()],
                WALRUS_TESTNET_AGGREGATOR,
            ),
        };
        let network = match network.as_str() {
            "mainnet" | "devnet" => network,
            _ => "testnet".to_string(),
        };
        Self {
            network,
            rpc_url: rpc.to_string(),
            publishers,
            aggregator: aggregator.to_string(),
            epochs: DEFAULT_EPOCHS,
            package_id: DEFAULT_PACKAGE_ID.to_string(),
            module: DEFAULT_MODULE.to_string(),
        }
    }

    /// Defaults for `VITAE_NETWORK` with per-endpoint environment overrides.
    pub fn from_env() -> Self {
        let inferred = std::env::var("VITAE_RPC_URL")
            .ok()
            .and_then(|url| infer_network_from_url(&url))
            .unwrap_or("testnet");
        let base = Self::for_network(&env_string_or("VITAE_NETWORK", inferred));
        let publishers = env_list("VITAE_WALRUS_PUBLISHERS");
        Self {
            rpc_url: env_string_or("VITAE_RPC_URL", &base.rpc_url),
            publishers: if publishers.is_empty() {
                base.publishers.clone()
            } else {
                publishers
            },
            aggregator: env_string_or("VITAE_WALRUS_AGGREGATOR", &base.aggregator),
            epochs: env_var_or("VITAE_WALRUS_EPOCHS", base.epochs),
            package_id: env_string_or("VITAE_PACKAGE_ID", &base.package_id),
            module: env_string_or("VITAE_MODULE", &base.module),
            network: base.network,
        }
    }

    /// Fully qualified Move type of credential objects.
    pub fn credential_struct_type(&self) -> String {
        format!("{}::{}::{}", self.package_id, self.module, CREDENTIAL_STRUCT)
    }

    /// Move call target of the mint entry function.
    pub fn issue_function(&self) -> String {
        format!("{}::{}::issue_diploma", self.package_id, self.module)
    }

    /// Explorer link for a transaction digest on this network.
    pub fn explorer_tx_url(&self, digest: &str) -> String {
        format!(
            "https://suiexplorer.com/txblock/{}?network={}",
            digest, self.network
        )
    }
}

impl Default for NetworkEndpoints {
    fn default() -> Self {
        Self::testnet()
    }
}

/// Best-effort network name from an endpoint URL.
pub fn infer_network_from_url(url: &str) -> Option<&'static str> {
    let lower = url.to_lowercase();
    if lower.contains("testnet") {
        Some("testnet")
    } else if lower.contains("devnet") {
        Some("devnet")
    } else if lower.contains("mainnet") {
        Some("mainnet")
    } else {
        None
    }
}
