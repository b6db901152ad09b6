//! Configuration module for the x402x facilitator server.
//!
//! Diverges from the teacher's JSON-config-file layering
//! (`Config::load_from_path`, `LiteralOrEnv<T>`, the `ChainConfig` enum
//! dispatching on CAIP-2 namespace): every value here is an environment
//! variable with an equivalent `clap` flag, read directly rather than
//! through a JSON document, since this facilitator only ever targets
//! `eip155` chains and the one-family config doesn't earn a namespace-keyed
//! document. The `clap::Parser` + `env` attribute idiom itself, and the
//! `dotenvy::dotenv()` layering beneath it, are kept from the teacher.

use std::collections::HashMap;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use clap::Parser;
use url::Url;

use crate::chain_id::ChainId;
use crate::gas::{GasCostConfig, GasEstimationStrategy};
use crate::network::{AssetConfig, BuiltinHookKind, GasModel, NetworkConfig, NetworkKind};

type BuiltinHookAddresses = HashMap<BuiltinHookKind, Address>;

/// A validated EVM private key, parsed directly from a hex string by `clap`.
#[derive(Clone, Copy, Debug)]
pub struct EvmPrivateKey(B256);

impl EvmPrivateKey {
    pub fn as_bytes(&self) -> [u8; 32] {
        self.0.0
    }
}

impl FromStr for EvmPrivateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s)
            .map(Self)
            .map_err(|e| format!("invalid EVM private key: {e}"))
    }
}

/// One statically known network: chain id plus its canonical USDC
/// deployment. Grounded in the teacher's `USDCDeployment::by_network`
/// (`src/network.rs`) and its sibling crate `x402-chain-eip155/src/networks.rs`,
/// generalized from a closed `Network` enum to a name lookup since this
/// facilitator's network set is configured, not compiled in.
struct KnownNetwork {
    human_name: &'static str,
    chain_id: u64,
    kind: NetworkKind,
    usdc_address: &'static str,
    usdc_decimals: u8,
    native_token_symbol: &'static str,
    gas_model: GasModel,
}

const KNOWN_NETWORKS: &[KnownNetwork] = &[
    KnownNetwork {
        human_name: "base",
        chain_id: 8453,
        kind: NetworkKind::Mainnet,
        usdc_address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
        usdc_decimals: 6,
        native_token_symbol: "ETH",
        gas_model: GasModel::Eip1559,
    },
    KnownNetwork {
        human_name: "base-sepolia",
        chain_id: 84532,
        kind: NetworkKind::Testnet,
        usdc_address: "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
        usdc_decimals: 6,
        native_token_symbol: "ETH",
        gas_model: GasModel::Eip1559,
    },
    KnownNetwork {
        human_name: "polygon",
        chain_id: 137,
        kind: NetworkKind::Mainnet,
        usdc_address: "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
        usdc_decimals: 6,
        native_token_symbol: "POL",
        gas_model: GasModel::Eip1559,
    },
    KnownNetwork {
        human_name: "polygon-amoy",
        chain_id: 80002,
        kind: NetworkKind::Testnet,
        usdc_address: "0x41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582",
        usdc_decimals: 6,
        native_token_symbol: "POL",
        gas_model: GasModel::Eip1559,
    },
    KnownNetwork {
        human_name: "avalanche",
        chain_id: 43114,
        kind: NetworkKind::Mainnet,
        usdc_address: "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E",
        usdc_decimals: 6,
        native_token_symbol: "AVAX",
        gas_model: GasModel::Eip1559,
    },
    KnownNetwork {
        human_name: "avalanche-fuji",
        chain_id: 43113,
        kind: NetworkKind::Testnet,
        usdc_address: "0x5425890298aed601595a70AB815c96711a31Bc65",
        usdc_decimals: 6,
        native_token_symbol: "AVAX",
        gas_model: GasModel::Eip1559,
    },
];

fn known_network(name: &str) -> Option<&'static KnownNetwork> {
    KNOWN_NETWORKS.iter().find(|n| n.human_name == name)
}

/// CLI/environment configuration surface for the facilitator process.
///
/// Every field doubles as an environment variable via `env = "..."`; `clap`
/// resolves CLI flag, then env var, then default, in that order, matching
/// the teacher's CLI-over-env-over-default precedence.
#[derive(Parser, Debug)]
#[command(name = "x402x-facilitator")]
#[command(about = "x402x router-settlement facilitator HTTP server")]
pub struct Config {
    /// Comma-separated signing private keys shared by every configured
    /// network's account pool.
    #[arg(long = "evm-private-keys", env = "EVM_PRIVATE_KEYS", value_delimiter = ',')]
    pub evm_private_keys: Vec<EvmPrivateKey>,

    /// Comma-separated list of enabled network names (e.g. `base,base-sepolia`).
    #[arg(long = "evm-networks", env = "EVM_NETWORKS", value_delimiter = ',')]
    pub evm_networks: Vec<String>,

    /// `network=router1|router2;network=router3` — router whitelist per
    /// network. A network absent from this var accepts no router, so
    /// settlement always fails closed rather than falling back to a
    /// compiled-in default.
    #[arg(long = "allowed-routers", env = "ALLOWED_ROUTERS", default_value = "")]
    pub allowed_routers_raw: String,

    /// `network=kind:address|kind:address;network2=...` — built-in hook
    /// contract addresses per network, where `kind` is one of `transfer`,
    /// `revenue_split`, `nft_mint`, `reward`. A hook address absent here is
    /// treated as a custom (non-built-in) hook, subject to
    /// `STRICT_HOOK_WHITELIST`.
    #[arg(long = "builtin-hook-addresses", env = "BUILTIN_HOOK_ADDRESSES", default_value = "")]
    pub builtin_hook_addresses_raw: String,

    /// Whether the v2 router-settlement path is accepted at all.
    #[arg(long = "facilitator-enable-v2", env = "FACILITATOR_ENABLE_V2", default_value_t = true)]
    pub facilitator_enable_v2: bool,

    /// Whether the legacy, non-router v1 payload shape is still accepted.
    #[arg(long = "facilitator-enable-v1", env = "FACILITATOR_ENABLE_V1", default_value_t = true)]
    pub facilitator_enable_v1: bool,

    #[arg(long, env = "MIN_GAS_LIMIT", default_value_t = 150_000)]
    pub min_gas_limit: u64,

    #[arg(long, env = "MAX_GAS_LIMIT", default_value_t = 5_000_000)]
    pub max_gas_limit: u64,

    #[arg(long, env = "SAFETY_MULTIPLIER", default_value_t = 1.5)]
    pub safety_multiplier: f64,

    #[arg(long, env = "DYNAMIC_GAS_LIMIT_MARGIN", default_value_t = 0.2)]
    pub dynamic_gas_limit_margin: f64,

    #[arg(long, env = "VALIDATION_TOLERANCE", default_value_t = 0.1)]
    pub validation_tolerance: f64,

    #[arg(long, env = "MIN_FACILITATOR_FEE_USD", default_value_t = 0.01)]
    pub min_facilitator_fee_usd: f64,

    #[arg(long, env = "MAX_FACILITATOR_FEE_USD", default_value_t = 10.0)]
    pub max_facilitator_fee_usd: f64,

    #[arg(long, env = "CACHE_TTL_TOKEN_VERSION", default_value_t = 3600)]
    pub cache_ttl_token_version_secs: u64,

    #[arg(long, env = "CACHE_MAX_KEYS", default_value_t = 1000)]
    pub cache_max_keys: usize,

    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub server_host: IpAddr,

    #[arg(long, env = "SERVER_PORT", default_value_t = 3000)]
    pub server_port: u16,

    #[arg(long, env = "SHUTDOWN_TIMEOUT_MS", default_value_t = 30_000)]
    pub shutdown_timeout_ms: u64,

    /// Per-settlement RPC timeout (§5), independent of `SHUTDOWN_TIMEOUT_MS`'s
    /// drain window.
    #[arg(long, env = "SETTLE_TIMEOUT_MS", default_value_t = 30_000)]
    pub settle_timeout_ms: u64,

    /// Per-verification RPC timeout (§5, balance-check round trip).
    #[arg(long, env = "VERIFY_TIMEOUT_MS", default_value_t = 5_000)]
    pub verify_timeout_ms: u64,

    #[arg(long, env = "REQUEST_BODY_LIMIT", default_value_t = 1_048_576)]
    pub request_body_limit_bytes: usize,

    #[arg(long, env = "RATE_LIMIT_VERIFY_MAX", default_value_t = 100)]
    pub rate_limit_verify_max: u32,

    #[arg(long, env = "RATE_LIMIT_SETTLE_MAX", default_value_t = 20)]
    pub rate_limit_settle_max: u32,

    #[arg(long, env = "ACCOUNT_POOL_STRATEGY", default_value = "round_robin")]
    pub account_pool_strategy: String,

    #[arg(long, env = "ACCOUNT_POOL_MAX_QUEUE_DEPTH", default_value_t = 10)]
    pub account_pool_max_queue_depth: usize,

    /// Minimum accrued fee (USDC base units, 6 decimals) worth sweeping in a
    /// `claim_fees` call.
    #[arg(long, env = "MIN_CLAIM_AMOUNT_USDC", default_value_t = 1_000_000)]
    pub min_claim_amount_usdc: u64,

    #[arg(long, env = "GAS_ESTIMATION_STRATEGY", default_value = "smart")]
    pub gas_estimation_strategy: String,

    #[arg(long, env = "STRICT_HOOK_WHITELIST", default_value_t = true)]
    pub strict_hook_whitelist: bool,
}

/// Configuration errors. A malformed value here is fatal at startup,
/// matching the teacher's `ConfigError` (`config.rs`) in spirit: the
/// process exits before binding the listener rather than limping along on
/// partial configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no networks configured (set EVM_NETWORKS)")]
    NoNetworks,
    #[error("no signing accounts configured (set EVM_PRIVATE_KEYS)")]
    NoSigners,
    #[error("unknown network {0:?}; not in the built-in network table")]
    UnknownNetwork(String),
    #[error("missing RPC_URL_{0} for configured network {1:?}")]
    MissingRpcUrl(String, String),
    #[error("invalid RPC_URL_{0}: {1}")]
    InvalidRpcUrl(String, url::ParseError),
    #[error("invalid ALLOWED_ROUTERS entry {0:?}: {1}")]
    InvalidAllowedRouters(String, String),
    #[error("invalid BUILTIN_HOOK_ADDRESSES entry {0:?}: {1}")]
    InvalidBuiltinHookAddresses(String, String),
    #[error("invalid gas estimation strategy {0:?}, expected code|simulation|smart")]
    InvalidGasStrategy(String),
}

impl Config {
    /// Parses CLI args and environment, with a `.env` file (if present)
    /// already loaded into the process environment by the caller via
    /// `dotenvy::dotenv()`, matching the teacher's `main.rs` (`dotenv().ok()`
    /// runs before any config parsing).
    pub fn load() -> Self {
        Config::parse()
    }

    fn env_var_suffix(human_name: &str) -> String {
        human_name.to_uppercase().replace('-', "_")
    }

    /// Resolves `RPC_URL_<NETWORK>` for every configured network.
    fn resolve_rpc_urls(&self) -> Result<HashMap<String, Url>, ConfigError> {
        let mut urls = HashMap::new();
        for network in &self.evm_networks {
            let suffix = Self::env_var_suffix(network);
            let var_name = format!("RPC_URL_{suffix}");
            let raw = std::env::var(&var_name)
                .map_err(|_| ConfigError::MissingRpcUrl(suffix.clone(), network.clone()))?;
            let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidRpcUrl(suffix, e))?;
            urls.insert(network.clone(), url);
        }
        Ok(urls)
    }

    /// Parses `ALLOWED_ROUTERS` (`network=router1|router2;network=router3`)
    /// into a per-network address list.
    fn resolve_allowed_routers(&self) -> Result<HashMap<String, Vec<Address>>, ConfigError> {
        let mut by_network: HashMap<String, Vec<Address>> = HashMap::new();
        if self.allowed_routers_raw.trim().is_empty() {
            return Ok(by_network);
        }
        for entry in self.allowed_routers_raw.split(';') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (network, routers) = entry.split_once('=').ok_or_else(|| {
                ConfigError::InvalidAllowedRouters(entry.to_string(), "expected network=addr|addr".to_string())
            })?;
            let mut addresses = Vec::new();
            for address in routers.split('|') {
                let address = Address::from_str(address.trim()).map_err(|e| {
                    ConfigError::InvalidAllowedRouters(entry.to_string(), e.to_string())
                })?;
                addresses.push(address);
            }
            by_network.insert(network.trim().to_string(), addresses);
        }
        Ok(by_network)
    }

    /// Parses `BUILTIN_HOOK_ADDRESSES`
    /// (`network=kind:address|kind:address;network2=...`) into a per-network
    /// built-in hook address map.
    fn resolve_builtin_hook_addresses(&self) -> Result<HashMap<String, BuiltinHookAddresses>, ConfigError> {
        let mut by_network: HashMap<String, BuiltinHookAddresses> = HashMap::new();
        if self.builtin_hook_addresses_raw.trim().is_empty() {
            return Ok(by_network);
        }
        for entry in self.builtin_hook_addresses_raw.split(';') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (network, hooks) = entry.split_once('=').ok_or_else(|| {
                ConfigError::InvalidBuiltinHookAddresses(
                    entry.to_string(),
                    "expected network=kind:addr|kind:addr".to_string(),
                )
            })?;
            let mut addresses = BuiltinHookAddresses::new();
            for hook in hooks.split('|') {
                let (kind, address) = hook.trim().split_once(':').ok_or_else(|| {
                    ConfigError::InvalidBuiltinHookAddresses(
                        entry.to_string(),
                        "expected kind:addr".to_string(),
                    )
                })?;
                let kind = BuiltinHookKind::from_str(kind.trim()).map_err(|e| {
                    ConfigError::InvalidBuiltinHookAddresses(entry.to_string(), e.0)
                })?;
                let address = Address::from_str(address.trim()).map_err(|e| {
                    ConfigError::InvalidBuiltinHookAddresses(entry.to_string(), e.to_string())
                })?;
                addresses.insert(kind, address);
            }
            by_network.insert(network.trim().to_string(), addresses);
        }
        Ok(by_network)
    }

    pub fn gas_estimation_strategy(&self) -> Result<GasEstimationStrategy, ConfigError> {
        match self.gas_estimation_strategy.as_str() {
            "code" => Ok(GasEstimationStrategy::Code),
            "simulation" => Ok(GasEstimationStrategy::Simulation),
            "smart" => Ok(GasEstimationStrategy::Smart),
            other => Err(ConfigError::InvalidGasStrategy(other.to_string())),
        }
    }

    pub fn gas_cost_config(&self) -> GasCostConfig {
        GasCostConfig {
            min_gas_limit: self.min_gas_limit,
            max_gas_limit: self.max_gas_limit,
            safety_multiplier: self.safety_multiplier,
            rpc_timeout: Duration::from_secs(5),
            ..GasCostConfig::default()
        }
    }

    pub fn cache_ttl_token_version(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_token_version_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    pub fn min_claim_amount(&self) -> alloy_primitives::U256 {
        alloy_primitives::U256::from(self.min_claim_amount_usdc)
    }

    pub fn private_key_bytes(&self) -> Vec<[u8; 32]> {
        self.evm_private_keys.iter().map(|k| k.as_bytes()).collect()
    }

    /// Builds one [`NetworkConfig`] per entry in `EVM_NETWORKS`, resolving
    /// RPC endpoints and router whitelists from their respective env vars
    /// and the rest from the built-in network table. Fails closed: an
    /// unknown network name, a missing RPC URL, or a malformed router
    /// whitelist entry is a startup error, never a silently-skipped network.
    pub fn network_configs(&self) -> Result<Vec<NetworkConfig>, ConfigError> {
        if self.evm_networks.is_empty() {
            return Err(ConfigError::NoNetworks);
        }
        if self.evm_private_keys.is_empty() {
            return Err(ConfigError::NoSigners);
        }

        let rpc_urls = self.resolve_rpc_urls()?;
        let allowed_routers = self.resolve_allowed_routers()?;
        let builtin_hook_addresses = self.resolve_builtin_hook_addresses()?;

        let mut configs = Vec::with_capacity(self.evm_networks.len());
        for human_name in &self.evm_networks {
            let known = known_network(human_name)
                .ok_or_else(|| ConfigError::UnknownNetwork(human_name.clone()))?;
            let routers = allowed_routers.get(human_name).cloned().unwrap_or_default();
            let settlement_router_address = *routers.first().unwrap_or(&Address::ZERO);
            configs.push(NetworkConfig {
                human_name: known.human_name.to_string(),
                chain_id: ChainId(known.chain_id),
                kind: known.kind,
                default_asset: AssetConfig {
                    address: Address::from_str(known.usdc_address).expect("built-in address is valid"),
                    decimals: known.usdc_decimals,
                    eip712_name: "USD Coin".to_string(),
                    eip712_version: "2".to_string(),
                },
                settlement_router_address,
                allowed_routers: routers,
                builtin_hook_addresses: builtin_hook_addresses.get(human_name).cloned().unwrap_or_default(),
                gas_model: known.gas_model,
                native_token_symbol: known.native_token_symbol.to_string(),
                rpc_url: rpc_urls
                    .get(human_name)
                    .cloned()
                    .expect("resolve_rpc_urls populated every configured network"),
            });
        }
        Ok(configs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            evm_private_keys: vec![EvmPrivateKey::from_str(
                "0x0000000000000000000000000000000000000000000000000000000000000001",
            )
            .unwrap()],
            evm_networks: vec!["base-sepolia".to_string()],
            allowed_routers_raw: "base-sepolia=0x0000000000000000000000000000000000000001".to_string(),
            builtin_hook_addresses_raw: String::new(),
            facilitator_enable_v2: true,
            facilitator_enable_v1: true,
            min_gas_limit: 150_000,
            max_gas_limit: 5_000_000,
            safety_multiplier: 1.5,
            dynamic_gas_limit_margin: 0.2,
            validation_tolerance: 0.1,
            min_facilitator_fee_usd: 0.01,
            max_facilitator_fee_usd: 10.0,
            cache_ttl_token_version_secs: 3600,
            cache_max_keys: 1000,
            server_host: "0.0.0.0".parse().unwrap(),
            server_port: 3000,
            shutdown_timeout_ms: 30_000,
            settle_timeout_ms: 30_000,
            verify_timeout_ms: 5_000,
            request_body_limit_bytes: 1_048_576,
            rate_limit_verify_max: 100,
            rate_limit_settle_max: 20,
            account_pool_strategy: "round_robin".to_string(),
            account_pool_max_queue_depth: 10,
            min_claim_amount_usdc: 1_000_000,
            gas_estimation_strategy: "smart".to_string(),
            strict_hook_whitelist: true,
        }
    }

    #[test]
    fn rejects_unknown_network() {
        let mut config = base_config();
        config.evm_networks = vec!["not-a-real-network".to_string()];
        unsafe { std::env::set_var("RPC_URL_NOT_A_REAL_NETWORK", "http://localhost:8545") };
        assert!(matches!(
            config.network_configs(),
            Err(ConfigError::UnknownNetwork(_))
        ));
    }

    #[test]
    fn requires_rpc_url_per_network() {
        let config = base_config();
        unsafe { std::env::remove_var("RPC_URL_BASE_SEPOLIA") };
        assert!(matches!(
            config.network_configs(),
            Err(ConfigError::MissingRpcUrl(_, _))
        ));
    }

    #[test]
    fn resolves_known_network_with_rpc_and_routers() {
        let config = base_config();
        unsafe { std::env::set_var("RPC_URL_BASE_SEPOLIA", "https://sepolia.base.org") };
        let configs = config.network_configs().unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].chain_id, ChainId(84532));
        assert_eq!(configs[0].allowed_routers.len(), 1);
        assert_eq!(
            configs[0].rpc_url.as_str(),
            "https://sepolia.base.org/"
        );
    }

    #[test]
    fn parses_multi_network_allowed_routers() {
        let mut config = base_config();
        config.evm_networks = vec!["base".to_string(), "base-sepolia".to_string()];
        config.allowed_routers_raw =
            "base=0x0000000000000000000000000000000000000001;base-sepolia=0x0000000000000000000000000000000000000002|0x0000000000000000000000000000000000000003"
                .to_string();
        unsafe {
            std::env::set_var("RPC_URL_BASE", "https://mainnet.base.org");
            std::env::set_var("RPC_URL_BASE_SEPOLIA", "https://sepolia.base.org");
        }
        let configs = config.network_configs().unwrap();
        let base = configs.iter().find(|c| c.human_name == "base").unwrap();
        let sepolia = configs.iter().find(|c| c.human_name == "base-sepolia").unwrap();
        assert_eq!(base.allowed_routers.len(), 1);
        assert_eq!(sepolia.allowed_routers.len(), 2);
    }

    #[test]
    fn rejects_empty_network_list() {
        let mut config = base_config();
        config.evm_networks = Vec::new();
        assert!(matches!(config.network_configs(), Err(ConfigError::NoNetworks)));
    }

    #[test]
    fn rejects_no_signers() {
        let mut config = base_config();
        config.evm_private_keys = Vec::new();
        assert!(matches!(config.network_configs(), Err(ConfigError::NoSigners)));
    }

    #[test]
    fn resolves_builtin_hook_addresses_per_network() {
        let mut config = base_config();
        config.builtin_hook_addresses_raw =
            "base-sepolia=transfer:0x0000000000000000000000000000000000000009|revenue_split:0x000000000000000000000000000000000000000a"
                .to_string();
        unsafe { std::env::set_var("RPC_URL_BASE_SEPOLIA", "https://sepolia.base.org") };
        let configs = config.network_configs().unwrap();
        let network = &configs[0];
        assert_eq!(network.builtin_hook_addresses.len(), 2);
        assert_eq!(
            network.builtin_hook_addresses.get(&BuiltinHookKind::Transfer),
            Some(&Address::from_str("0x0000000000000000000000000000000000000009").unwrap())
        );
    }

    #[test]
    fn rejects_malformed_builtin_hook_addresses() {
        let mut config = base_config();
        config.builtin_hook_addresses_raw = "base-sepolia=bogus_kind:0x0000000000000000000000000000000000000009".to_string();
        unsafe { std::env::set_var("RPC_URL_BASE_SEPOLIA", "https://sepolia.base.org") };
        assert!(matches!(
            config.network_configs(),
            Err(ConfigError::InvalidBuiltinHookAddresses(_, _))
        ));
    }

    #[test]
    fn gas_estimation_strategy_parses_known_values() {
        let mut config = base_config();
        config.gas_estimation_strategy = "code".to_string();
        assert_eq!(config.gas_estimation_strategy().unwrap(), GasEstimationStrategy::Code);
        config.gas_estimation_strategy = "bogus".to_string();
        assert!(config.gas_estimation_strategy().is_err());
    }
}
