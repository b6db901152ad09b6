//! Network Registry (C1): resolves human-readable or CAIP-2 network
//! identifiers to a canonical [`ChainId`] and immutable [`NetworkConfig`].
//!
//! Grounded in the teacher's `src/network.rs` (`Network` enum + per-network
//! `USDCDeployment` statics), generalized because this facilitator's router
//! and hook addresses are per-deployment configuration rather than hardcoded
//! constants.

use alloy_primitives::Address;
use dashmap::DashMap;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::chain_id::ChainId;
use crate::errors::ErrorReason;

/// Whether a network is production or a test network; affects nothing
/// functionally today but is surfaced in `/health` and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkKind {
    Mainnet,
    Testnet,
}

/// Fee-filling strategy for transactions on a given chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasModel {
    Eip1559,
    Legacy,
}

/// Metadata describing the ERC-20 settlement asset (USDC) on one network.
#[derive(Debug, Clone)]
pub struct AssetConfig {
    pub address: Address,
    pub decimals: u8,
    pub eip712_name: String,
    pub eip712_version: String,
}

/// Immutable, process-lifetime configuration for one network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub human_name: String,
    pub chain_id: ChainId,
    pub kind: NetworkKind,
    pub default_asset: AssetConfig,
    pub settlement_router_address: Address,
    pub allowed_routers: Vec<Address>,
    pub builtin_hook_addresses: HashMap<BuiltinHookKind, Address>,
    pub gas_model: GasModel,
    pub native_token_symbol: String,
    pub rpc_url: url::Url,
}

/// The built-in hook types this facilitator ships validators for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinHookKind {
    Transfer,
    RevenueSplit,
    NftMint,
    Reward,
}

/// Parses the `kind` tag used in `BUILTIN_HOOK_ADDRESSES` config entries
/// (`network=kind:address|kind:address;...`).
pub struct BuiltinHookKindParseError(pub String);

impl FromStr for BuiltinHookKind {
    type Err = BuiltinHookKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(BuiltinHookKind::Transfer),
            "revenue_split" => Ok(BuiltinHookKind::RevenueSplit),
            "nft_mint" => Ok(BuiltinHookKind::NftMint),
            "reward" => Ok(BuiltinHookKind::Reward),
            other => Err(BuiltinHookKindParseError(other.to_string())),
        }
    }
}

/// Resolves network identifiers and owns every [`NetworkConfig`].
///
/// Resolution of human-readable aliases (`"base-sepolia"`) is cached in a
/// `DashMap` the same way the teacher caches derived values (see
/// `PendingNonceManager`'s use of `DashMap` for per-key state), even though
/// the alias table itself is small and static, to keep lookup lock-free.
pub struct NetworkRegistry {
    by_chain_id: HashMap<ChainId, Arc<NetworkConfig>>,
    aliases: HashMap<String, ChainId>,
    resolution_cache: DashMap<String, ChainId>,
}

impl NetworkRegistry {
    pub fn new(configs: Vec<NetworkConfig>) -> Self {
        let mut by_chain_id = HashMap::new();
        let mut aliases = HashMap::new();
        for config in configs {
            let chain_id = config.chain_id;
            aliases.insert(config.human_name.clone(), chain_id);
            by_chain_id.insert(chain_id, Arc::new(config));
        }
        Self {
            by_chain_id,
            aliases,
            resolution_cache: DashMap::new(),
        }
    }

    /// Resolves a human-readable name or CAIP-2 string (`"eip155:8453"`) to
    /// its [`NetworkConfig`]. Resolution is idempotent and injective over the
    /// supported set (testable property 8 in the wire spec).
    pub fn resolve(&self, identifier: &str) -> Result<Arc<NetworkConfig>, ErrorReason> {
        if let Some(chain_id) = self.resolution_cache.get(identifier) {
            return self.by_chain_id.get(&*chain_id).cloned().ok_or(ErrorReason::UnsupportedNetwork);
        }

        let chain_id = if let Ok(chain_id) = ChainId::from_str(identifier) {
            chain_id
        } else if let Some(chain_id) = self.aliases.get(identifier) {
            *chain_id
        } else {
            return Err(ErrorReason::UnsupportedNetwork);
        };

        if !self.by_chain_id.contains_key(&chain_id) {
            return Err(ErrorReason::UnsupportedNetwork);
        }
        self.resolution_cache.insert(identifier.to_string(), chain_id);
        self.by_chain_id
            .get(&chain_id)
            .cloned()
            .ok_or(ErrorReason::UnsupportedNetwork)
    }

    pub fn by_chain_id(&self, chain_id: ChainId) -> Option<Arc<NetworkConfig>> {
        self.by_chain_id.get(&chain_id).cloned()
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<NetworkConfig>> {
        self.by_chain_id.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config(name: &str, chain_id: u64) -> NetworkConfig {
        NetworkConfig {
            human_name: name.to_string(),
            chain_id: ChainId(chain_id),
            kind: NetworkKind::Testnet,
            default_asset: AssetConfig {
                address: Address::ZERO,
                decimals: 6,
                eip712_name: "USD Coin".to_string(),
                eip712_version: "2".to_string(),
            },
            settlement_router_address: Address::ZERO,
            allowed_routers: vec![Address::ZERO],
            builtin_hook_addresses: HashMap::new(),
            gas_model: GasModel::Eip1559,
            native_token_symbol: "ETH".to_string(),
            rpc_url: url::Url::parse("http://localhost:8545").unwrap(),
        }
    }

    #[test]
    fn resolves_by_alias_and_caip2() {
        let registry = NetworkRegistry::new(vec![sample_config("base-sepolia", 84532)]);
        assert_eq!(
            registry.resolve("base-sepolia").unwrap().chain_id,
            ChainId(84532)
        );
        assert_eq!(
            registry.resolve("eip155:84532").unwrap().chain_id,
            ChainId(84532)
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        let registry = NetworkRegistry::new(vec![sample_config("base-sepolia", 84532)]);
        let first = registry.resolve("base-sepolia").unwrap();
        let second = registry.resolve("base-sepolia").unwrap();
        assert_eq!(first.chain_id, second.chain_id);
    }

    #[test]
    fn rejects_unknown_network() {
        let registry = NetworkRegistry::new(vec![sample_config("base-sepolia", 84532)]);
        assert!(matches!(
            registry.resolve("optimism-sepolia"),
            Err(ErrorReason::UnsupportedNetwork)
        ));
    }

    #[test]
    fn builtin_hook_kind_parses_known_tags() {
        assert_eq!(BuiltinHookKind::from_str("transfer").unwrap(), BuiltinHookKind::Transfer);
        assert_eq!(BuiltinHookKind::from_str("revenue_split").unwrap(), BuiltinHookKind::RevenueSplit);
        assert_eq!(BuiltinHookKind::from_str("nft_mint").unwrap(), BuiltinHookKind::NftMint);
        assert_eq!(BuiltinHookKind::from_str("reward").unwrap(), BuiltinHookKind::Reward);
        assert!(BuiltinHookKind::from_str("bogus").is_err());
    }
}
