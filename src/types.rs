//! Wire DTOs for the x402x protocol: `PaymentRequirements`, `PaymentPayload`,
//! and the HTTP surface's request/response bodies.
//!
//! Grounded in the teacher's `src/types.rs` — same newtype-per-field
//! strategy (regex-validated hex strings, decimal-string-encoded integers,
//! `camelCase` wire names) — generalized for the router-settlement
//! extension (`extra`, §3) that the teacher's non-router payload doesn't
//! carry.

use alloy_primitives::{Address, AddressError, U256};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use url::Url;

use crate::errors::ErrorReason;
use crate::timestamp::UnixTimestamp;

pub const EVM_MAX_ATOMIC_UNITS: usize = 18;

/// Protocol version. `V1` is the legacy non-router compatibility shim; `V2`
/// is the router-settlement path this crate otherwise implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum X402Version {
    V1,
    V2,
}

#[derive(Debug)]
pub struct X402VersionError(pub u8);

impl fmt::Display for X402VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported x402Version: {}", self.0)
    }
}

impl std::error::Error for X402VersionError {}

impl TryFrom<u8> for X402Version {
    type Error = X402VersionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(X402Version::V1),
            2 => Ok(X402Version::V2),
            other => Err(X402VersionError(other)),
        }
    }
}

impl From<X402Version> for u8 {
    fn from(value: X402Version) -> Self {
        match value {
            X402Version::V1 => 1,
            X402Version::V2 => 2,
        }
    }
}

impl Serialize for X402Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8((*self).into())
    }
}

impl<'de> Deserialize<'de> for X402Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        X402Version::try_from(value).map_err(D::Error::custom)
    }
}

/// Only the `"exact"` scheme is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Exact,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exact")
    }
}

/// A 65-byte ECDSA signature, optionally ERC-6492-wrapped. Serialized as a
/// `0x`-prefixed hex string; length is validated at decode (130 hex chars
/// for the bare form, but ERC-6492-wrapped signatures are longer, so we
/// store the raw decoded bytes rather than a fixed-size array).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmSignature(pub Vec<u8>);

static SIGNATURE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]+$").expect("valid signature regex"));

impl<'de> Deserialize<'de> for EvmSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if !SIGNATURE_REGEX.is_match(&s) || s.len() % 2 != 0 {
            return Err(D::Error::custom("invalid EVM signature format"));
        }
        let bytes =
            hex::decode(&s[2..]).map_err(|_| D::Error::custom("invalid hex in signature"))?;
        if bytes.len() < 65 {
            return Err(D::Error::custom("signature shorter than 65 bytes"));
        }
        Ok(EvmSignature(bytes))
    }
}

impl Serialize for EvmSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(&self.0)))
    }
}

/// `alloy_primitives::Address` with `Display`/`serde` support matching the
/// rest of the wire protocol's hex-string convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmAddress(pub Address);

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<EvmAddress> for Address {
    fn from(value: EvmAddress) -> Self {
        value.0
    }
}

impl From<Address> for EvmAddress {
    fn from(value: Address) -> Self {
        EvmAddress(value)
    }
}

/// A 32-byte hex value: used both for the EIP-3009 nonce (the commitment
/// digest) and the settlement salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexBytes32(pub [u8; 32]);

static BYTES32_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").expect("valid bytes32 regex"));

impl<'de> Deserialize<'de> for HexBytes32 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if !BYTES32_REGEX.is_match(&s) {
            return Err(D::Error::custom("invalid bytes32 format"));
        }
        let bytes = hex::decode(&s[2..]).map_err(|_| D::Error::custom("invalid hex"))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("expected exactly 32 bytes"))?;
        Ok(HexBytes32(array))
    }
}

impl Serialize for HexBytes32 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
    }
}

impl From<HexBytes32> for alloy_primitives::B256 {
    fn from(value: HexBytes32) -> Self {
        alloy_primitives::B256::from(value.0)
    }
}

/// Variable-length hex-encoded bytes, used for `hookData`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HexBytes(pub Vec<u8>);

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let stripped = s.strip_prefix("0x").unwrap_or(&s);
        if stripped.is_empty() {
            return Ok(HexBytes(Vec::new()));
        }
        let bytes = hex::decode(stripped).map_err(|_| D::Error::custom("invalid hex bytes"))?;
        Ok(HexBytes(bytes))
    }
}

impl Serialize for HexBytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(&self.0)))
    }
}

/// A token amount, smallest units, decimal-string-encoded to avoid
/// JS `Number` precision loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TokenAmount(pub u64);

impl TokenAmount {
    pub fn checked_add(self, other: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_add(other.0).map(TokenAmount)
    }

    pub fn checked_sub(self, other: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_sub(other.0).map(TokenAmount)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.len() > EVM_MAX_ATOMIC_UNITS {
            return Err(D::Error::custom(format!(
                "value too long (max {EVM_MAX_ATOMIC_UNITS} digits)"
            )));
        }
        let value = s
            .parse::<u64>()
            .map_err(|_| D::Error::custom("value is not a non-negative integer"))?;
        Ok(TokenAmount(value))
    }
}

impl From<TokenAmount> for U256 {
    fn from(value: TokenAmount) -> Self {
        U256::from(value.0)
    }
}

/// Either a `0x`-prefixed EVM address, or an opaque off-chain identifier
/// (for non-EVM beneficiaries this facilitator does not settle to but may
/// still need to describe in a response).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedAddress(pub String);

static MIXED_ADDRESS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(0x[a-fA-F0-9]{40}|[A-Za-z0-9][A-Za-z0-9-]{0,34}[A-Za-z0-9])$")
        .expect("valid mixed address regex")
});

impl<'de> Deserialize<'de> for MixedAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if MIXED_ADDRESS_REGEX.is_match(&s) {
            Ok(MixedAddress(s))
        } else {
            Err(D::Error::custom("invalid MixedAddress format"))
        }
    }
}

impl Serialize for MixedAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl fmt::Display for MixedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<MixedAddress> for Address {
    type Error = AddressError;

    fn try_from(value: MixedAddress) -> Result<Self, Self::Error> {
        value.0.parse()
    }
}

impl From<EvmAddress> for MixedAddress {
    fn from(value: EvmAddress) -> Self {
        MixedAddress(value.0.to_string())
    }
}

/// A 32-byte EVM transaction hash, `0x`-prefixed hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionHash(pub [u8; 32]);

impl<'de> Deserialize<'de> for TransactionHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if !BYTES32_REGEX.is_match(&s) {
            return Err(D::Error::custom("invalid transaction hash format"));
        }
        let bytes = hex::decode(&s[2..]).map_err(|_| D::Error::custom("invalid hex"))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("transaction hash must be 32 bytes"))?;
        Ok(TransactionHash(array))
    }
}

impl Serialize for TransactionHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
    }
}

impl fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<alloy_primitives::B256> for TransactionHash {
    fn from(value: alloy_primitives::B256) -> Self {
        TransactionHash(value.0)
    }
}

/// EIP-3009 `{from, to, value, validAfter, validBefore, nonce}`. `to` is
/// always the settlement router, not the final beneficiary — the true
/// recipient lives in `extra.payTo` (see [`RouterSettlementExtra`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayloadAuthorization {
    pub from: EvmAddress,
    pub to: EvmAddress,
    pub value: TokenAmount,
    pub valid_after: UnixTimestamp,
    pub valid_before: UnixTimestamp,
    pub nonce: HexBytes32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    pub signature: EvmSignature,
    pub authorization: ExactEvmPayloadAuthorization,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: X402Version,
    pub scheme: Scheme,
    /// Human-readable or CAIP-2 network identifier, resolved by
    /// [`crate::network::NetworkRegistry`].
    pub network: String,
    pub payload: ExactEvmPayload,
}

/// `extra`'s typed shape once decoded (verification pipeline step 3).
/// `pay_to` here is the *final* beneficiary, distinct from the top-level
/// `PaymentRequirements.pay_to`, which equals the settlement router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterSettlementExtra {
    pub settlement_router: EvmAddress,
    pub salt: HexBytes32,
    pub pay_to: EvmAddress,
    pub facilitator_fee: TokenAmount,
    pub hook: EvmAddress,
    #[serde(default)]
    pub hook_data: HexBytes,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: Scheme,
    pub network: String,
    pub max_amount_required: TokenAmount,
    pub resource: Url,
    pub description: String,
    pub mime_type: String,
    pub output_schema: Option<serde_json::Value>,
    /// Invariant: equals the settlement router address when `extra` carries
    /// router-settlement fields; the true beneficiary is `extra.payTo`.
    pub pay_to: MixedAddress,
    pub max_timeout_seconds: u64,
    pub asset: MixedAddress,
    pub extra: Option<serde_json::Value>,
}

impl PaymentRequirements {
    /// Parses `extra` into [`RouterSettlementExtra`]. A missing or malformed
    /// `extra` is `DECODING_ERROR` (§3 "[FULL] `extra` bag typing").
    pub fn router_settlement_extra(&self) -> Result<RouterSettlementExtra, ErrorReason> {
        let extra = self.extra.as_ref().ok_or(ErrorReason::DecodingError)?;
        serde_json::from_value(extra.clone()).map_err(|_| ErrorReason::DecodingError)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub x402_version: X402Version,
    pub payment_payload: PaymentPayload,
    pub payment_requirements: PaymentRequirements,
}

pub type SettleRequest = VerifyRequest;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<ErrorReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<EvmAddress>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<ErrorReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<EvmAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionHash>,
    pub network: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedKind {
    pub x402_version: X402Version,
    pub scheme: Scheme,
    pub network: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    pub kinds: Vec<SupportedKind>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateFeeResponse {
    pub network: String,
    pub minimum_facilitator_fee: TokenAmount,
    pub valid_for_seconds: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingFeeEntry {
    pub network: String,
    pub router: EvmAddress,
    pub token: EvmAddress,
    pub facilitator_address: EvmAddress,
    pub amount: TokenAmount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingFeesResponse {
    pub fees: Vec<PendingFeeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimFeesRequest {
    pub networks: Option<Vec<String>>,
    pub tokens: Option<Vec<MixedAddress>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Success,
    Skipped,
    Failed,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResult {
    pub network: String,
    pub facilitator_address: EvmAddress,
    pub status: ClaimStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionHash>,
    pub claimed_tokens: Vec<EvmAddress>,
    pub total_claimed: TokenAmount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimFeesResponse {
    pub success: bool,
    pub claims: Vec<ClaimResult>,
    pub total_claimed: TokenAmount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthNetworkSummary {
    pub network: String,
    pub chain_id: u64,
    pub router: EvmAddress,
    pub accounts: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub networks: Vec<HealthNetworkSummary>,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_amount_round_trips_as_string() {
        let amount = TokenAmount(1_000_000);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"1000000\"");
        let back: TokenAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn x402_version_serializes_as_number() {
        assert_eq!(serde_json::to_string(&X402Version::V2).unwrap(), "2");
        let parsed: X402Version = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, X402Version::V2);
        assert!(serde_json::from_str::<X402Version>("3").is_err());
    }

    #[test]
    fn mixed_address_accepts_evm_and_opaque_ids() {
        assert!(
            serde_json::from_str::<MixedAddress>(
                "\"0x1111111111111111111111111111111111111111\""
            )
            .is_ok()
        );
        assert!(serde_json::from_str::<MixedAddress>("\"merchant-123\"").is_ok());
        assert!(serde_json::from_str::<MixedAddress>("\"not valid!!\"").is_err());
    }

    #[test]
    fn router_settlement_extra_requires_extra_field() {
        let requirements = PaymentRequirements {
            scheme: Scheme::Exact,
            network: "base-sepolia".to_string(),
            max_amount_required: TokenAmount(1_000_000),
            resource: Url::parse("https://example.com/resource").unwrap(),
            description: String::new(),
            mime_type: "application/json".to_string(),
            output_schema: None,
            pay_to: MixedAddress("0x1111111111111111111111111111111111111111".to_string()),
            max_timeout_seconds: 60,
            asset: MixedAddress("0x2222222222222222222222222222222222222222".to_string()),
            extra: None,
        };
        assert_eq!(
            requirements.router_settlement_extra().unwrap_err(),
            ErrorReason::DecodingError
        );
    }

    #[test]
    fn hex_bytes_round_trips_empty_and_nonempty() {
        let empty: HexBytes = serde_json::from_str("\"0x\"").unwrap();
        assert!(empty.0.is_empty());
        let nonempty: HexBytes = serde_json::from_str("\"0x0102ff\"").unwrap();
        assert_eq!(nonempty.0, vec![1, 2, 255]);
    }
}
