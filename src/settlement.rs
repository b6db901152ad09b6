//! Settlement Engine (C9).
//!
//! Orchestration order follows the teacher's `Facilitator::settle`
//! (`facilitator_local.rs`): re-verify, build the transfer call, send it,
//! await the receipt, and branch on status. The gas-budget and profitability
//! bookkeeping, and the account-pool submission step, have no teacher
//! counterpart — the teacher calls `transferWithAuthorization` directly from
//! the request-handling task rather than queuing through a dedicated pool.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};

use crate::account_pool::AccountPool;
use crate::balance::BalanceSource;
use crate::errors::ErrorReason;
use crate::gas::{self, GasCostConfig, GasEstimationStrategy, SettlementCallParams};
use crate::price::{GasPriceCache, TokenPriceCache};
use crate::types::{PaymentPayload, PaymentRequirements, TransactionHash};
use crate::verification::{verify_payment, verify_payment_v1, VerificationContext, VerifiedPayment};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub success: bool,
    pub error_reason: Option<ErrorReason>,
    pub payer: Option<Address>,
    pub transaction: Option<TransactionHash>,
}

#[derive(Debug, Clone, Copy)]
pub struct SettlementMetrics {
    pub gas_used: u64,
    pub gas_cost_usd: f64,
    pub facilitator_fee_usd: f64,
    pub profit_usd: f64,
}

/// Everything one `settleAndExecute` call needs, independent of how it gets
/// submitted.
#[derive(Debug, Clone)]
pub struct SettlementCall {
    pub router: Address,
    pub asset: Address,
    pub from: Address,
    pub value: U256,
    pub valid_after: U256,
    pub valid_before: U256,
    pub nonce: B256,
    pub signature: Vec<u8>,
    pub salt: B256,
    pub pay_to: Address,
    pub facilitator_fee: U256,
    pub hook: Address,
    pub hook_data: Vec<u8>,
    pub gas_limit: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptOutcome {
    Success(B256),
    Reverted(B256),
}

/// Submits a call on-chain and awaits its receipt. Implemented over an
/// `alloy` provider/contract instance bound to [`crate::router_abi::SettlementRouter`]
/// in production; kept as a trait so the engine stays provider-agnostic and
/// unit-testable.
pub trait Submitter: Send + Sync + 'static {
    fn submit(
        &self,
        call: SettlementCall,
    ) -> impl std::future::Future<Output = Result<ReceiptOutcome, ErrorReason>> + Send;
}

/// Runs §4.9's full procedure for one payment: re-verify, compute the gas
/// budget, submit through the account pool, await the receipt, and
/// reclassify it.
#[allow(clippy::too_many_arguments)]
pub async fn settle_payment<B, S, F, Fut>(
    verification_ctx: &VerificationContext<'_>,
    balance_source: &B,
    gas_config: &GasCostConfig,
    gas_strategy: GasEstimationStrategy,
    gas_price_cache: &GasPriceCache,
    token_price_cache: &TokenPriceCache,
    account_pool: &AccountPool<Result<ReceiptOutcome, ErrorReason>>,
    submitter: Arc<S>,
    settle_timeout: Duration,
    payload: &PaymentPayload,
    requirements: &PaymentRequirements,
    estimate_gas: F,
) -> (SettlementOutcome, Option<SettlementMetrics>)
where
    B: BalanceSource,
    S: Submitter,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<u64, ErrorReason>> + Send,
{
    let verified = match verify_payment(verification_ctx, balance_source, payload, requirements).await
    {
        Ok(verified) => verified,
        Err(reason) => {
            return (
                SettlementOutcome {
                    success: false,
                    error_reason: Some(reason),
                    payer: None,
                    transaction: None,
                },
                None,
            );
        }
    };

    settle_verified(
        verified,
        gas_config,
        gas_strategy,
        gas_price_cache,
        token_price_cache,
        account_pool,
        submitter,
        settle_timeout,
        payload,
        estimate_gas,
    )
    .await
}

/// The post-verification half of §4.9 (steps b–e), factored out so it is
/// directly testable against a hand-built [`VerifiedPayment`] without
/// needing a real EIP-712 signature.
#[allow(clippy::too_many_arguments)]
async fn settle_verified<S, F, Fut>(
    verified: VerifiedPayment,
    gas_config: &GasCostConfig,
    gas_strategy: GasEstimationStrategy,
    gas_price_cache: &GasPriceCache,
    token_price_cache: &TokenPriceCache,
    account_pool: &AccountPool<Result<ReceiptOutcome, ErrorReason>>,
    submitter: Arc<S>,
    settle_timeout: Duration,
    payload: &PaymentPayload,
    estimate_gas: F,
) -> (SettlementOutcome, Option<SettlementMetrics>)
where
    S: Submitter,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<u64, ErrorReason>> + Send,
{
    // b. Gas budget
    let hook: Address = verified.extra.hook.into();
    let hook_kind = verified
        .network
        .builtin_hook_addresses
        .iter()
        .find(|(_, address)| **address == hook)
        .map(|(kind, _)| *kind);
    let call_params = SettlementCallParams {
        hook_kind,
        hook_data: verified.extra.hook_data.0.clone(),
    };
    let estimate = gas::estimate(gas_strategy, &call_params, gas_config, estimate_gas).await;
    if !estimate.is_valid {
        return (
            SettlementOutcome {
                success: false,
                error_reason: estimate.error_reason,
                payer: Some(verified.payer),
                transaction: None,
            },
            None,
        );
    }

    let gas_price_wei = gas_price_cache.get(verified.network.chain_id);
    let gas_cost_native = estimate.gas_limit as f64 * gas_price_wei as f64 / 1e18;
    let native_price_usd =
        token_price_cache.get(verified.network.chain_id, &verified.network.native_token_symbol);
    let gas_cost_usd = gas_cost_native * native_price_usd;
    let fee_usd = verified.extra.facilitator_fee.0 as f64
        / 10f64.powi(verified.network.default_asset.decimals as i32);
    let profit_usd = fee_usd - gas_cost_usd;
    if profit_usd < 0.0 {
        tracing::warn!(
            network = %verified.network.human_name,
            payer = %verified.payer,
            gas_cost_usd,
            fee_usd,
            profit_usd,
            "settlement is loss-making"
        );
    }
    let metrics = SettlementMetrics {
        gas_used: estimate.gas_limit,
        gas_cost_usd,
        facilitator_fee_usd: fee_usd,
        profit_usd,
    };

    // c. Submit
    let call = SettlementCall {
        router: verified.network.settlement_router_address,
        asset: verified.network.default_asset.address,
        from: verified.payer,
        value: verified.value,
        valid_after: payload.payload.authorization.valid_after.into(),
        valid_before: payload.payload.authorization.valid_before.into(),
        nonce: verified.commitment,
        signature: payload.payload.signature.0.clone(),
        salt: verified.extra.salt.into(),
        pay_to: verified.extra.pay_to.into(),
        facilitator_fee: verified.extra.facilitator_fee.into(),
        hook,
        hook_data: verified.extra.hook_data.0.clone(),
        gas_limit: estimate.gas_limit,
    };

    let payer = verified.payer;
    let submission = tokio::time::timeout(
        settle_timeout,
        account_pool.enqueue(payer, move || async move { submitter.submit(call).await }),
    )
    .await;

    // d. Reclassify the receipt
    let outcome = match submission {
        Ok(Ok(Ok(ReceiptOutcome::Success(tx_hash)))) => SettlementOutcome {
            success: true,
            error_reason: None,
            payer: Some(payer),
            transaction: Some(TransactionHash::from(tx_hash)),
        },
        Ok(Ok(Ok(ReceiptOutcome::Reverted(tx_hash)))) => SettlementOutcome {
            success: false,
            error_reason: Some(ErrorReason::InvalidTransactionState),
            payer: Some(payer),
            transaction: Some(TransactionHash::from(tx_hash)),
        },
        Ok(Ok(Err(reason))) => SettlementOutcome {
            success: false,
            error_reason: Some(reason),
            payer: Some(payer),
            transaction: None,
        },
        Ok(Err(reason)) => SettlementOutcome {
            success: false,
            error_reason: Some(reason),
            payer: Some(payer),
            transaction: None,
        },
        Err(_) => SettlementOutcome {
            success: false,
            error_reason: Some(ErrorReason::TransactionTimeout),
            payer: Some(payer),
            transaction: None,
        },
    };

    (outcome, Some(metrics))
}

/// A direct `transferWithAuthorization` call on the asset itself — the
/// legacy v1 settlement path, which has no router, no facilitator fee, and
/// no hook.
#[derive(Debug, Clone)]
pub struct LegacyTransferCall {
    pub asset: Address,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub valid_after: U256,
    pub valid_before: U256,
    pub nonce: B256,
    pub signature: Vec<u8>,
    pub gas_limit: u64,
}

pub trait LegacySubmitter: Send + Sync + 'static {
    fn submit_transfer(
        &self,
        call: LegacyTransferCall,
    ) -> impl std::future::Future<Output = Result<ReceiptOutcome, ErrorReason>> + Send;
}

/// The v1 legacy settlement path: verify, then submit `transferWithAuthorization`
/// directly — no gas-budget/profitability accounting, since there is no
/// facilitator fee to weigh it against.
pub async fn settle_v1<B, S>(
    verification_ctx: &VerificationContext<'_>,
    balance_source: &B,
    gas_config: &GasCostConfig,
    account_pool: &AccountPool<Result<ReceiptOutcome, ErrorReason>>,
    submitter: Arc<S>,
    settle_timeout: Duration,
    payload: &PaymentPayload,
    requirements: &PaymentRequirements,
) -> SettlementOutcome
where
    B: BalanceSource,
    S: LegacySubmitter,
{
    let verified = match verify_payment_v1(verification_ctx, balance_source, payload, requirements).await {
        Ok(verified) => verified,
        Err(reason) => {
            return SettlementOutcome {
                success: false,
                error_reason: Some(reason),
                payer: None,
                transaction: None,
            };
        }
    };

    let gas_limit = gas_config.min_gas_limit.max(gas_config.base_tx_cost);
    let call = LegacyTransferCall {
        asset: verified.asset,
        from: verified.payer,
        to: verified.recipient,
        value: verified.value,
        valid_after: payload.payload.authorization.valid_after.into(),
        valid_before: payload.payload.authorization.valid_before.into(),
        nonce: B256::from(payload.payload.authorization.nonce),
        signature: payload.payload.signature.0.clone(),
        gas_limit,
    };

    let payer = verified.payer;
    let submission = tokio::time::timeout(
        settle_timeout,
        account_pool.enqueue(payer, move || async move { submitter.submit_transfer(call).await }),
    )
    .await;

    match submission {
        Ok(Ok(Ok(ReceiptOutcome::Success(tx_hash)))) => SettlementOutcome {
            success: true,
            error_reason: None,
            payer: Some(payer),
            transaction: Some(TransactionHash::from(tx_hash)),
        },
        Ok(Ok(Ok(ReceiptOutcome::Reverted(tx_hash)))) => SettlementOutcome {
            success: false,
            error_reason: Some(ErrorReason::InvalidTransactionState),
            payer: Some(payer),
            transaction: Some(TransactionHash::from(tx_hash)),
        },
        Ok(Ok(Err(reason))) => SettlementOutcome {
            success: false,
            error_reason: Some(reason),
            payer: Some(payer),
            transaction: None,
        },
        Ok(Err(reason)) => SettlementOutcome {
            success: false,
            error_reason: Some(reason),
            payer: Some(payer),
            transaction: None,
        },
        Err(_) => SettlementOutcome {
            success: false,
            error_reason: Some(ErrorReason::TransactionTimeout),
            payer: Some(payer),
            transaction: None,
        },
    }
}
