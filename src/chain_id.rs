//! CAIP-2 chain identifiers, restricted to the `eip155` namespace.
//!
//! This facilitator settles only on EVM-compatible chains, so [`ChainId`]
//! is a thin wrapper around a numeric chain reference rather than the fully
//! general `<namespace>:<reference>` CAIP-2 string. Human-readable network
//! names (`"base-sepolia"`) are resolved to a [`ChainId`] by the network
//! registry (see [`crate::network`]), not by this type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const EIP155_NAMESPACE: &str = "eip155";

/// A CAIP-2 chain identifier for an EVM chain, e.g. `eip155:8453`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChainId(pub u64);

impl ChainId {
    pub fn reference(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{EIP155_NAMESPACE}:{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid CAIP-2 chain id: {0}")]
pub struct ChainIdParseError(pub String);

impl FromStr for ChainId {
    type Err = ChainIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, reference) = s
            .split_once(':')
            .ok_or_else(|| ChainIdParseError(s.to_string()))?;
        if namespace != EIP155_NAMESPACE {
            return Err(ChainIdParseError(s.to_string()));
        }
        let reference = reference
            .parse::<u64>()
            .map_err(|_| ChainIdParseError(s.to_string()))?;
        Ok(ChainId(reference))
    }
}

impl TryFrom<String> for ChainId {
    type Error = ChainIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChainId> for String {
    fn from(value: ChainId) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_caip2() {
        assert_eq!(ChainId::from_str("eip155:8453").unwrap(), ChainId(8453));
    }

    #[test]
    fn rejects_other_namespaces() {
        assert!(ChainId::from_str("solana:mainnet").is_err());
        assert!(ChainId::from_str("8453").is_err());
    }

    #[test]
    fn displays_canonically() {
        assert_eq!(ChainId(84532).to_string(), "eip155:84532");
    }
}
