//! Verification Pipeline (C8): the fixed ten-step check that decides
//! whether a signed payment is admissible, composing the Network Registry,
//! Commitment Calculator, Hook Validator Registry, Balance Checker, and
//! price caches.
//!
//! Step order and the structural/domain/signature/timing checks follow the
//! teacher's `assert_valid_payment` (`facilitator_local.rs`); the
//! settlement-extra, router whitelist, fee policy, commitment, and hook
//! data steps are this protocol's router-settlement extension and have no
//! teacher counterpart.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, FixedBytes, Signature, B256, U256};
use alloy_sol_types::{eip712_domain, SolStruct, SolValue};

use crate::balance::{BalanceChecker, BalanceSource};
use crate::commitment::{compute_commitment, CommitmentParams};
use crate::errors::ErrorReason;
use crate::hooks::validate_builtin_hook;
use crate::network::{NetworkConfig, NetworkRegistry};
use crate::price::TokenPriceCache;
use crate::router_abi::{Erc6492Signature, TransferWithAuthorization, ERC6492_MAGIC_SUFFIX};
use crate::types::{ExactEvmPayloadAuthorization, PaymentPayload, PaymentRequirements, RouterSettlementExtra};

/// Grace window applied to `validBefore`, matching the teacher's
/// `assert_time`: authorizations expiring within the next few seconds are
/// treated as already expired to absorb submission latency.
const EXPIRY_GRACE_SECONDS: u64 = 6;

/// Dependencies the pipeline needs beyond the payload/requirements pair.
/// `token_price_cache` is accepted for parity with the fee-policy dollar
/// threshold described in §4.8 step 5, even though the settlement asset
/// (USDC) is treated as pegged to $1 rather than priced via the native-gas
/// oracle this cache otherwise serves (see [`crate::price::TokenPriceCache`]).
pub struct VerificationContext<'a> {
    pub network_registry: &'a NetworkRegistry,
    pub balance_checker: &'a BalanceChecker,
    pub token_price_cache: &'a TokenPriceCache,
    pub min_facilitator_fee_usd: f64,
    pub max_facilitator_fee_usd: f64,
    /// When true, a hook address that isn't one of the network's configured
    /// built-ins is rejected outright instead of being deferred to gas
    /// estimation's simulation path.
    pub strict_hook_whitelist: bool,
    /// Timeout applied to the balance-check RPC round trip (§5: "5s verify").
    pub verify_timeout: Duration,
}

/// The pipeline's output once every step has passed: everything the
/// settlement engine needs to submit `settleAndExecute` without re-parsing
/// the requirements bag.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub network: Arc<NetworkConfig>,
    pub extra: RouterSettlementExtra,
    pub payer: Address,
    pub value: U256,
    pub hook_amount: U256,
    pub commitment: B256,
}

/// Runs the full ten-step pipeline. Returns the first failing step's
/// [`ErrorReason`]; short-circuits, matching §4.8's fixed-order semantics.
pub async fn verify_payment<B: BalanceSource>(
    ctx: &VerificationContext<'_>,
    balance_source: &B,
    payload: &PaymentPayload,
    requirements: &PaymentRequirements,
) -> Result<VerifiedPayment, ErrorReason> {
    // 1. Structural
    if payload.scheme != requirements.scheme {
        return Err(ErrorReason::SchemeMismatch);
    }
    if payload.network != requirements.network {
        return Err(ErrorReason::NetworkMismatch);
    }
    let network = ctx.network_registry.resolve(&requirements.network)?;

    // 2. Token policy
    let asset: Address = requirements
        .asset
        .clone()
        .try_into()
        .map_err(|_| ErrorReason::InvalidAddress)?;
    if asset != network.default_asset.address {
        return Err(ErrorReason::UnsupportedToken);
    }

    // 3. Settlement extra
    let extra = requirements.router_settlement_extra()?;

    // 4. Router whitelist
    let router: Address = extra.settlement_router.into();
    if !network.allowed_routers.contains(&router) {
        return Err(ErrorReason::RouterNotAllowed);
    }
    // Invariant (§3): the top-level payTo equals the settlement router; the
    // true beneficiary lives at extra.payTo.
    let requirements_pay_to: Address = requirements
        .pay_to
        .clone()
        .try_into()
        .map_err(|_| ErrorReason::InvalidAddress)?;
    if requirements_pay_to != router {
        return Err(ErrorReason::ReceiverMismatch);
    }

    let authorization = &payload.payload.authorization;
    let authorization_to: Address = authorization.to.into();
    if authorization_to != router {
        return Err(ErrorReason::ReceiverMismatch);
    }

    let value = U256::from(authorization.value);
    let facilitator_fee = U256::from(extra.facilitator_fee);

    // 5. Fee policy. The router deducts the fee from `value` before handing
    // the remainder to the hook, so `value` must cover it.
    if facilitator_fee > value {
        return Err(ErrorReason::FeeBelowMin);
    }
    let hook_amount = value - facilitator_fee;
    let fee_decimal = extra.facilitator_fee.0 as f64
        / 10f64.powi(network.default_asset.decimals as i32);
    if fee_decimal < ctx.min_facilitator_fee_usd {
        return Err(ErrorReason::FeeBelowMin);
    }
    if fee_decimal > ctx.max_facilitator_fee_usd {
        return Err(ErrorReason::FeeAboveMax);
    }

    // 6. Signature
    let payer: Address = authorization.from.into();
    let domain = eip712_domain! {
        name: extra.name.clone(),
        version: extra.version.clone(),
        chain_id: network.chain_id.reference(),
        verifying_contract: asset,
    };
    let message = TransferWithAuthorization {
        from: payer,
        to: router,
        value,
        validAfter: authorization.valid_after.into(),
        validBefore: authorization.valid_before.into(),
        nonce: FixedBytes(authorization.nonce.0),
    };
    let recovered = recover_signer(&payload.payload.signature.0, &domain, &message)?;
    if recovered != payer {
        return Err(ErrorReason::InvalidSignature);
    }

    // 7. Timing
    assert_timing(authorization)?;

    // 8. Commitment
    let commitment = compute_commitment(&CommitmentParams {
        chain_id: network.chain_id.reference(),
        router,
        asset,
        from: payer,
        value,
        valid_after: authorization.valid_after.into(),
        valid_before: authorization.valid_before.into(),
        salt: extra.salt.into(),
        pay_to: extra.pay_to.into(),
        facilitator_fee,
        hook: extra.hook.into(),
        hook_data: extra.hook_data.0.clone(),
    });
    if commitment != B256::from(authorization.nonce) {
        return Err(ErrorReason::InvalidCommitment);
    }

    // 9. Balance
    let balance = tokio::time::timeout(
        ctx.verify_timeout,
        ctx.balance_checker.check(balance_source, asset, payer, value),
    )
    .await
    .map_err(|_| ErrorReason::RpcError)?
    .map_err(|_| ErrorReason::RpcError)?;
    if !balance.has_sufficient {
        return Err(ErrorReason::InsufficientFunds);
    }

    // 10. Hook data
    let hook: Address = extra.hook.into();
    let builtin_kind = network
        .builtin_hook_addresses
        .iter()
        .find(|(_, address)| **address == hook)
        .map(|(kind, _)| *kind);
    match builtin_kind {
        Some(kind) => {
            let outcome = validate_builtin_hook(
                kind,
                hook,
                &network.builtin_hook_addresses,
                &extra.hook_data.0,
                hook_amount,
                Address::from(extra.pay_to),
            );
            if !outcome.is_valid {
                return Err(outcome.error_reason.unwrap_or(ErrorReason::HookNotAllowed));
            }
        }
        None if ctx.strict_hook_whitelist => return Err(ErrorReason::HookNotAllowed),
        None => {
            // Custom hook: deferred to gas estimation's simulation path
            // (§4.3, §4.4).
        }
    }

    Ok(VerifiedPayment {
        network,
        extra,
        payer,
        value,
        hook_amount,
        commitment,
    })
}

/// Output of the v1 legacy path: enough for [`crate::settlement::settle_v1`]
/// to call `transferWithAuthorization` on the asset directly.
#[derive(Debug, Clone)]
pub struct VerifiedPaymentV1 {
    pub network: Arc<NetworkConfig>,
    pub payer: Address,
    pub recipient: Address,
    pub asset: Address,
    pub value: U256,
}

/// Verifies a legacy v1 (non-router) payment: structural, asset, signature,
/// timing, and balance checks only. There is no settlement-router whitelist,
/// commitment, or hook validation, since v1 payloads carry none of those
/// fields — the authorization's `nonce` is used as supplied by the client
/// rather than recomputed, since there is no commitment to check it against.
pub async fn verify_payment_v1<B: BalanceSource>(
    ctx: &VerificationContext<'_>,
    balance_source: &B,
    payload: &PaymentPayload,
    requirements: &PaymentRequirements,
) -> Result<VerifiedPaymentV1, ErrorReason> {
    if payload.scheme != requirements.scheme {
        return Err(ErrorReason::SchemeMismatch);
    }
    if payload.network != requirements.network {
        return Err(ErrorReason::NetworkMismatch);
    }
    let network = ctx.network_registry.resolve(&requirements.network)?;

    let asset: Address = requirements
        .asset
        .clone()
        .try_into()
        .map_err(|_| ErrorReason::InvalidAddress)?;
    if asset != network.default_asset.address {
        return Err(ErrorReason::UnsupportedToken);
    }

    let recipient: Address = requirements
        .pay_to
        .clone()
        .try_into()
        .map_err(|_| ErrorReason::InvalidAddress)?;
    let authorization = &payload.payload.authorization;
    let authorization_to: Address = authorization.to.into();
    if authorization_to != recipient {
        return Err(ErrorReason::ReceiverMismatch);
    }

    let value = U256::from(authorization.value);
    if value < U256::from(requirements.max_amount_required) {
        return Err(ErrorReason::InsufficientValue);
    }

    let payer: Address = authorization.from.into();
    let domain = eip712_domain! {
        name: network.default_asset.eip712_name.clone(),
        version: network.default_asset.eip712_version.clone(),
        chain_id: network.chain_id.reference(),
        verifying_contract: asset,
    };
    let message = TransferWithAuthorization {
        from: payer,
        to: recipient,
        value,
        validAfter: authorization.valid_after.into(),
        validBefore: authorization.valid_before.into(),
        nonce: FixedBytes(authorization.nonce.0),
    };
    let recovered = recover_signer(&payload.payload.signature.0, &domain, &message)?;
    if recovered != payer {
        return Err(ErrorReason::InvalidSignature);
    }

    assert_timing(authorization)?;

    let balance = tokio::time::timeout(
        ctx.verify_timeout,
        ctx.balance_checker.check(balance_source, asset, payer, value),
    )
    .await
    .map_err(|_| ErrorReason::RpcError)?
    .map_err(|_| ErrorReason::RpcError)?;
    if !balance.has_sufficient {
        return Err(ErrorReason::InsufficientFunds);
    }

    Ok(VerifiedPaymentV1 {
        network,
        payer,
        recipient,
        asset,
        value,
    })
}

fn assert_timing(authorization: &ExactEvmPayloadAuthorization) -> Result<(), ErrorReason> {
    let now = crate::timestamp::UnixTimestamp::now()
        .map_err(|_| ErrorReason::UnexpectedError)?
        .0;
    if authorization.valid_before.0 < now + EXPIRY_GRACE_SECONDS {
        return Err(ErrorReason::AuthorizationExpired);
    }
    if authorization.valid_after.0 > now {
        return Err(ErrorReason::AuthorizationNotYetValid);
    }
    Ok(())
}

/// Recovers the signer of an EIP-712 `TransferWithAuthorization` message,
/// peeling an ERC-6492 wrapper first if the signature carries one.
///
/// ERC-6492 wraps a signature with deployment calldata for a not-yet-deployed
/// smart contract wallet; fully validating it would require simulating that
/// deployment against the chain. This recovers the bare inner ECDSA
/// signature instead, which covers EOA payers and already-deployed smart
/// wallets that happen to use the ERC-6492 envelope; it does not validate a
/// counterfactual wallet's deployment calldata.
fn recover_signer(
    signature_bytes: &[u8],
    domain: &alloy_sol_types::Eip712Domain,
    message: &TransferWithAuthorization,
) -> Result<Address, ErrorReason> {
    let inner = peel_erc6492(signature_bytes)?;
    let array: [u8; 65] = inner.try_into().map_err(|_| ErrorReason::InvalidSignature)?;
    let signature = Signature::from_raw_array(&array).map_err(|_| ErrorReason::InvalidSignature)?;
    let hash = message.eip712_signing_hash(domain);
    signature
        .recover_address_from_prehash(&hash)
        .map_err(|_| ErrorReason::InvalidSignature)
}

fn peel_erc6492(signature_bytes: &[u8]) -> Result<Vec<u8>, ErrorReason> {
    if signature_bytes.len() < 32 {
        return Err(ErrorReason::InvalidSignature);
    }
    let (body, suffix) = signature_bytes.split_at(signature_bytes.len() - 32);
    if suffix == ERC6492_MAGIC_SUFFIX {
        let wrapped =
            Erc6492Signature::abi_decode(body).map_err(|_| ErrorReason::InvalidSignature)?;
        Ok(wrapped.innerSignature.to_vec())
    } else {
        Ok(signature_bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain_id::ChainId;
    use crate::network::{AssetConfig, BuiltinHookKind, GasModel, NetworkKind};
    use crate::types::{
        EvmAddress, EvmSignature, ExactEvmPayload, HexBytes32, MixedAddress, Scheme, TokenAmount,
        X402Version,
    };
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::time::Duration;
    use url::Url;

    const PRIVATE_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn sample_network(router: Address, asset: Address) -> NetworkConfig {
        NetworkConfig {
            human_name: "base-sepolia".to_string(),
            chain_id: ChainId(84532),
            kind: NetworkKind::Testnet,
            default_asset: AssetConfig {
                address: asset,
                decimals: 6,
                eip712_name: "USD Coin".to_string(),
                eip712_version: "2".to_string(),
            },
            settlement_router_address: router,
            allowed_routers: vec![router],
            builtin_hook_addresses: HashMap::new(),
            gas_model: GasModel::Eip1559,
            native_token_symbol: "ETH".to_string(),
            rpc_url: Url::parse("http://localhost:8545").unwrap(),
        }
    }

    struct FixedBalance(U256);
    impl BalanceSource for FixedBalance {
        async fn fetch_balance(&self, _token: Address, _owner: Address) -> Result<U256, String> {
            Ok(self.0)
        }
    }

    fn build_signed_payload(
        signer: &PrivateKeySigner,
        router: Address,
        asset: Address,
        value: U256,
        facilitator_fee: U256,
        hook: Address,
        pay_to: Address,
        salt: B256,
    ) -> (PaymentPayload, PaymentRequirements) {
        let payer = signer.address();
        let domain = eip712_domain! {
            name: "USD Coin".to_string(),
            version: "2".to_string(),
            chain_id: 84532u64,
            verifying_contract: asset,
        };
        let value_after = U256::ZERO;
        let value_before = U256::from(9_999_999_999u64);
        let commitment = compute_commitment(&CommitmentParams {
            chain_id: 84532,
            router,
            asset,
            from: payer,
            value,
            valid_after: value_after,
            valid_before: value_before,
            salt,
            pay_to,
            facilitator_fee,
            hook,
            hook_data: vec![],
        });
        let message = TransferWithAuthorization {
            from: payer,
            to: router,
            value,
            validAfter: value_after,
            validBefore: value_before,
            nonce: FixedBytes(commitment.0),
        };
        let hash = message.eip712_signing_hash(&domain);
        let signature = signer.sign_hash_sync(&hash).unwrap();

        let extra = serde_json::json!({
            "settlementRouter": format!("{router:#x}"),
            "salt": format!("0x{}", hex::encode(salt.0)),
            "payTo": format!("{pay_to:#x}"),
            "facilitatorFee": facilitator_fee.to_string(),
            "hook": format!("{hook:#x}"),
            "hookData": "0x",
            "name": "USD Coin",
            "version": "2",
        });

        let requirements = PaymentRequirements {
            scheme: Scheme::Exact,
            network: "base-sepolia".to_string(),
            max_amount_required: TokenAmount((value - facilitator_fee).to::<u64>()),
            resource: Url::parse("https://example.com/resource").unwrap(),
            description: String::new(),
            mime_type: "application/json".to_string(),
            output_schema: None,
            pay_to: MixedAddress(format!("{router:#x}")),
            max_timeout_seconds: 60,
            asset: MixedAddress(format!("{asset:#x}")),
            extra: Some(extra),
        };

        let payload = PaymentPayload {
            x402_version: X402Version::V2,
            scheme: Scheme::Exact,
            network: "base-sepolia".to_string(),
            payload: ExactEvmPayload {
                signature: EvmSignature(signature.as_bytes().to_vec()),
                authorization: ExactEvmPayloadAuthorization {
                    from: EvmAddress(payer),
                    to: EvmAddress(router),
                    value: TokenAmount(value.to::<u64>()),
                    valid_after: value_after.into(),
                    valid_before: value_before.into(),
                    nonce: HexBytes32(commitment.0),
                },
            },
        };
        (payload, requirements)
    }

    #[tokio::test]
    async fn accepts_a_correctly_signed_transfer_payment() {
        let signer = PrivateKeySigner::from_str(PRIVATE_KEY).unwrap();
        let router = Address::repeat_byte(0x11);
        let asset = Address::repeat_byte(0x22);
        let hook = Address::repeat_byte(0x33);
        let pay_to = Address::repeat_byte(0x44);
        let value = U256::from(1_010_000u64);
        let fee = U256::from(10_000u64);

        let (payload, requirements) = build_signed_payload(
            &signer,
            router,
            asset,
            value,
            fee,
            hook,
            pay_to,
            B256::repeat_byte(0x55),
        );

        let mut network = sample_network(router, asset);
        network
            .builtin_hook_addresses
            .insert(BuiltinHookKind::Transfer, hook);
        let registry = NetworkRegistry::new(vec![network]);
        let balance_checker = BalanceChecker::new(Duration::from_secs(60), 100);
        let balance_source = FixedBalance(U256::from(10_000_000u64));
        let token_price_cache = TokenPriceCache::new(Duration::from_secs(60), 10, HashMap::new());
        let ctx = VerificationContext {
            network_registry: &registry,
            balance_checker: &balance_checker,
            token_price_cache: &token_price_cache,
            min_facilitator_fee_usd: 0.001,
            max_facilitator_fee_usd: 10.0,
            strict_hook_whitelist: true,
            verify_timeout: Duration::from_secs(5),
        };

        let verified = verify_payment(&ctx, &balance_source, &payload, &requirements)
            .await
            .unwrap();
        assert_eq!(verified.payer, signer.address());
        assert_eq!(verified.hook_amount, U256::from(1_000_000u64));
    }

    #[tokio::test]
    async fn fee_above_configured_max_is_rejected() {
        let signer = PrivateKeySigner::from_str(PRIVATE_KEY).unwrap();
        let router = Address::repeat_byte(0x11);
        let asset = Address::repeat_byte(0x22);
        let hook = Address::repeat_byte(0x33);
        let pay_to = Address::repeat_byte(0x44);
        let value = U256::from(1_010_000u64);
        let fee = U256::from(10_000u64);

        let (payload, requirements) = build_signed_payload(
            &signer,
            router,
            asset,
            value,
            fee,
            hook,
            pay_to,
            B256::repeat_byte(0x55),
        );

        let mut network = sample_network(router, asset);
        network
            .builtin_hook_addresses
            .insert(BuiltinHookKind::Transfer, hook);
        let registry = NetworkRegistry::new(vec![network]);
        let balance_checker = BalanceChecker::new(Duration::from_secs(60), 100);
        let balance_source = FixedBalance(U256::from(10_000_000u64));
        let token_price_cache = TokenPriceCache::new(Duration::from_secs(60), 10, HashMap::new());
        let ctx = VerificationContext {
            network_registry: &registry,
            balance_checker: &balance_checker,
            token_price_cache: &token_price_cache,
            min_facilitator_fee_usd: 0.001,
            // The payload's fee is 0.01 USDC; capping below that forces the
            // upper-bound branch rather than the floor.
            max_facilitator_fee_usd: 0.001,
            strict_hook_whitelist: true,
            verify_timeout: Duration::from_secs(5),
        };

        let err = verify_payment(&ctx, &balance_source, &payload, &requirements)
            .await
            .unwrap_err();
        assert_eq!(err, ErrorReason::FeeAboveMax);
    }

    #[tokio::test]
    async fn tampered_value_fails_commitment_check() {
        let signer = PrivateKeySigner::from_str(PRIVATE_KEY).unwrap();
        let router = Address::repeat_byte(0x11);
        let asset = Address::repeat_byte(0x22);
        let hook = Address::repeat_byte(0x33);
        let pay_to = Address::repeat_byte(0x44);
        let value = U256::from(1_010_000u64);
        let fee = U256::from(10_000u64);

        let (mut payload, requirements) = build_signed_payload(
            &signer,
            router,
            asset,
            value,
            fee,
            hook,
            pay_to,
            B256::repeat_byte(0x55),
        );
        // Bump value after signing: the signature and commitment no longer
        // match this tampered authorization.
        payload.payload.authorization.value = TokenAmount(value.to::<u64>() + 1);

        let mut network = sample_network(router, asset);
        network
            .builtin_hook_addresses
            .insert(BuiltinHookKind::Transfer, hook);
        let registry = NetworkRegistry::new(vec![network]);
        let balance_checker = BalanceChecker::new(Duration::from_secs(60), 100);
        let balance_source = FixedBalance(U256::from(10_000_000u64));
        let token_price_cache = TokenPriceCache::new(Duration::from_secs(60), 10, HashMap::new());
        let ctx = VerificationContext {
            network_registry: &registry,
            balance_checker: &balance_checker,
            token_price_cache: &token_price_cache,
            min_facilitator_fee_usd: 0.001,
            max_facilitator_fee_usd: 10.0,
            strict_hook_whitelist: true,
            verify_timeout: Duration::from_secs(5),
        };

        let err = verify_payment(&ctx, &balance_source, &payload, &requirements)
            .await
            .unwrap_err();
        assert_eq!(err, ErrorReason::InvalidSignature);
    }

    #[tokio::test]
    async fn router_not_in_allowed_set_is_rejected() {
        let signer = PrivateKeySigner::from_str(PRIVATE_KEY).unwrap();
        let router = Address::repeat_byte(0x11);
        let asset = Address::repeat_byte(0x22);
        let hook = Address::repeat_byte(0x33);
        let pay_to = Address::repeat_byte(0x44);
        let value = U256::from(1_010_000u64);
        let fee = U256::from(10_000u64);

        let (payload, requirements) = build_signed_payload(
            &signer,
            router,
            asset,
            value,
            fee,
            hook,
            pay_to,
            B256::repeat_byte(0x55),
        );

        let mut network = sample_network(Address::repeat_byte(0x99), asset);
        network.allowed_routers = vec![Address::repeat_byte(0x99)];
        let registry = NetworkRegistry::new(vec![network]);
        let balance_checker = BalanceChecker::new(Duration::from_secs(60), 100);
        let balance_source = FixedBalance(U256::from(10_000_000u64));
        let token_price_cache = TokenPriceCache::new(Duration::from_secs(60), 10, HashMap::new());
        let ctx = VerificationContext {
            network_registry: &registry,
            balance_checker: &balance_checker,
            token_price_cache: &token_price_cache,
            min_facilitator_fee_usd: 0.001,
            max_facilitator_fee_usd: 10.0,
            strict_hook_whitelist: false,
            verify_timeout: Duration::from_secs(5),
        };

        let err = verify_payment(&ctx, &balance_source, &payload, &requirements)
            .await
            .unwrap_err();
        assert_eq!(err, ErrorReason::RouterNotAllowed);
    }

    #[tokio::test]
    async fn insufficient_balance_is_reported() {
        let signer = PrivateKeySigner::from_str(PRIVATE_KEY).unwrap();
        let router = Address::repeat_byte(0x11);
        let asset = Address::repeat_byte(0x22);
        let hook = Address::repeat_byte(0x33);
        let pay_to = Address::repeat_byte(0x44);
        let value = U256::from(1_010_000u64);
        let fee = U256::from(10_000u64);

        let (payload, requirements) = build_signed_payload(
            &signer,
            router,
            asset,
            value,
            fee,
            hook,
            pay_to,
            B256::repeat_byte(0x55),
        );

        let mut network = sample_network(router, asset);
        network
            .builtin_hook_addresses
            .insert(BuiltinHookKind::Transfer, hook);
        let registry = NetworkRegistry::new(vec![network]);
        let balance_checker = BalanceChecker::new(Duration::from_secs(60), 100);
        let balance_source = FixedBalance(U256::from(1u64));
        let token_price_cache = TokenPriceCache::new(Duration::from_secs(60), 10, HashMap::new());
        let ctx = VerificationContext {
            network_registry: &registry,
            balance_checker: &balance_checker,
            token_price_cache: &token_price_cache,
            min_facilitator_fee_usd: 0.001,
            max_facilitator_fee_usd: 10.0,
            strict_hook_whitelist: true,
            verify_timeout: Duration::from_secs(5),
        };

        let err = verify_payment(&ctx, &balance_source, &payload, &requirements)
            .await
            .unwrap_err();
        assert_eq!(err, ErrorReason::InsufficientFunds);
    }

    #[tokio::test]
    async fn v1_legacy_path_accepts_a_direct_transfer_authorization() {
        let signer = PrivateKeySigner::from_str(PRIVATE_KEY).unwrap();
        let asset = Address::repeat_byte(0x22);
        let recipient = Address::repeat_byte(0x44);
        let payer = signer.address();
        let value = U256::from(1_000_000u64);

        let domain = eip712_domain! {
            name: "USD Coin".to_string(),
            version: "2".to_string(),
            chain_id: 84532u64,
            verifying_contract: asset,
        };
        let nonce = B256::repeat_byte(0x66);
        let message = TransferWithAuthorization {
            from: payer,
            to: recipient,
            value,
            validAfter: U256::ZERO,
            validBefore: U256::from(9_999_999_999u64),
            nonce: FixedBytes(nonce.0),
        };
        let hash = message.eip712_signing_hash(&domain);
        let signature = signer.sign_hash_sync(&hash).unwrap();

        let network = sample_network(Address::repeat_byte(0x11), asset);
        let registry = NetworkRegistry::new(vec![network]);
        let balance_checker = BalanceChecker::new(Duration::from_secs(60), 100);
        let balance_source = FixedBalance(U256::from(10_000_000u64));
        let token_price_cache = TokenPriceCache::new(Duration::from_secs(60), 10, HashMap::new());
        let ctx = VerificationContext {
            network_registry: &registry,
            balance_checker: &balance_checker,
            token_price_cache: &token_price_cache,
            min_facilitator_fee_usd: 0.0,
            max_facilitator_fee_usd: 10.0,
            strict_hook_whitelist: false,
            verify_timeout: Duration::from_secs(5),
        };

        let payload = PaymentPayload {
            x402_version: X402Version::V1,
            scheme: Scheme::Exact,
            network: "base-sepolia".to_string(),
            payload: ExactEvmPayload {
                signature: EvmSignature(signature.as_bytes().to_vec()),
                authorization: ExactEvmPayloadAuthorization {
                    from: EvmAddress(payer),
                    to: EvmAddress(recipient),
                    value: TokenAmount(value.to::<u64>()),
                    valid_after: crate::timestamp::UnixTimestamp(0),
                    valid_before: crate::timestamp::UnixTimestamp(9_999_999_999),
                    nonce: HexBytes32(nonce.0),
                },
            },
        };
        let requirements = PaymentRequirements {
            scheme: Scheme::Exact,
            network: "base-sepolia".to_string(),
            max_amount_required: TokenAmount(value.to::<u64>()),
            resource: Url::parse("https://example.com/resource").unwrap(),
            description: String::new(),
            mime_type: "application/json".to_string(),
            output_schema: None,
            pay_to: MixedAddress(format!("{recipient:#x}")),
            max_timeout_seconds: 60,
            asset: MixedAddress(format!("{asset:#x}")),
            extra: None,
        };

        let verified = verify_payment_v1(&ctx, &balance_source, &payload, &requirements)
            .await
            .unwrap();
        assert_eq!(verified.payer, payer);
        assert_eq!(verified.recipient, recipient);
        assert_eq!(verified.value, value);
    }
}
