//! Alloy-backed wiring (C13): concrete implementations of the
//! provider-facing traits [`BalanceSource`], [`Submitter`], [`LegacySubmitter`],
//! [`PendingFeesSource`], [`ClaimSubmitter`], and [`dispatch::GasEstimator`],
//! bound to a live RPC endpoint.
//!
//! Read-only calls follow the teacher's `fetch_token_nonce`
//! (`scheme/v2_eip155_upto/client.rs`): `ProviderBuilder::new().connect_http(url)`
//! plus a generated `sol!` contract binding's `.call()`. Write calls follow
//! `facilitator_local.rs`'s settle path: `.send()`, then `.get_receipt()`,
//! then branch on `receipt.status()`.
//!
//! The teacher's wallet-enabled provider (`chain/eip155/mod.rs`) combines
//! every configured signer into one `EthereumWallet` behind a custom
//! `NonceFiller`/multi-transport-fallback stack, because its facilitator
//! dispatches submissions without the queue-per-account serialization
//! [`crate::account_pool::AccountPool`] already provides here. We build one
//! single-signer provider per account instead and round-robin across them;
//! `alloy`'s default `NonceFiller` already serializes nonce assignment for
//! concurrent sends from the same address, so nothing beyond the default
//! filler stack is needed.

use std::sync::atomic::{AtomicUsize, Ordering};

use alloy_network::{Ethereum, EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_provider::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use url::Url;

use crate::balance::BalanceSource;
use crate::chain_id::ChainId;
use crate::dispatch::GasEstimator;
use crate::erc20_abi::{Eip3009, Erc20};
use crate::errors::ErrorReason;
use crate::fee_claim::{ClaimOutcome, ClaimSubmitter, PendingFeesSource};
use crate::price::GasPriceSource;
use crate::router_abi::SettlementRouter;
use crate::settlement::{LegacySubmitter, LegacyTransferCall, ReceiptOutcome, Submitter};
use crate::types::SettleRequest;

/// A read-only connection to one network's RPC endpoint, used for balance
/// checks, pending-fee lookups, and gas simulation — none of which need a
/// signer.
pub struct EvmReadClient {
    provider: DynProvider,
}

impl EvmReadClient {
    pub fn connect(rpc_url: &Url) -> Self {
        let provider = ProviderBuilder::new().connect_http(rpc_url.clone()).erased();
        Self { provider }
    }
}

impl BalanceSource for EvmReadClient {
    async fn fetch_balance(&self, token: Address, owner: Address) -> Result<U256, String> {
        let contract = Erc20::new(token, &self.provider);
        contract
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| e.to_string())
    }
}

impl PendingFeesSource for EvmReadClient {
    async fn fetch_pending_fees(
        &self,
        router: Address,
        facilitator: Address,
        token: Address,
    ) -> Result<U256, String> {
        let contract = SettlementRouter::new(router, &self.provider);
        contract
            .getPendingFees(facilitator, token)
            .call()
            .await
            .map_err(|e| e.to_string())
    }
}

/// Estimates gas for `settleAndExecute` against the router, from the raw
/// wire request rather than a fully re-verified [`crate::verification::VerifiedPayment`] —
/// an estimate only needs plausible calldata, not a re-proven signature, so
/// this skips straight from the request's own fields to an RPC round trip.
impl GasEstimator for EvmReadClient {
    async fn estimate_gas(&self, request: SettleRequest) -> Result<u64, ErrorReason> {
        let payload = &request.payment_payload;
        let requirements = &request.payment_requirements;
        let extra = requirements.router_settlement_extra()?;

        let asset: Address = requirements
            .asset
            .clone()
            .try_into()
            .map_err(|_| ErrorReason::InvalidAddress)?;
        let auth = &payload.payload.authorization;

        let call = SettlementRouter::settleAndExecuteCall {
            token: asset,
            from: auth.from.into(),
            value: auth.value.into(),
            validAfter: auth.valid_after.into(),
            validBefore: auth.valid_before.into(),
            nonce: auth.nonce.into(),
            signature: Bytes::from(payload.payload.signature.0.clone()),
            salt: extra.salt.into(),
            payTo: extra.pay_to.into(),
            facilitatorFee: extra.facilitator_fee.into(),
            hook: extra.hook.into(),
            hookData: Bytes::from(extra.hook_data.0.clone()),
        };

        let tx = TransactionRequest::default()
            .with_to(extra.settlement_router.into())
            .with_from(auth.from.into())
            .with_input(call.abi_encode());

        self.provider
            .estimate_gas(tx)
            .await
            .map_err(|_| ErrorReason::GasEstimationError)
    }
}

impl GasPriceSource for EvmReadClient {
    async fn fetch_gas_price(&self, _chain_id: ChainId) -> Result<u128, String> {
        self.provider.get_gas_price().await.map_err(|e| e.to_string())
    }
}

/// One signing account's wallet-enabled provider, used for writes.
fn connect_signer(rpc_url: &Url, private_key: &[u8; 32]) -> Result<(Address, DynProvider), String> {
    let signer = PrivateKeySigner::from_bytes(&B256::from(*private_key))
        .map_err(|e| format!("invalid private key: {e}"))?;
    let address = signer.address();
    let wallet = EthereumWallet::from(signer);
    let provider = ProviderBuilder::new()
        .wallet(wallet)
        .connect_http(rpc_url.clone())
        .erased();
    Ok((address, provider))
}

/// Round-robins submissions across one network's signing accounts. Shared
/// across [`Submitter`], [`LegacySubmitter`], and [`ClaimSubmitter`] since
/// all three reduce to "build a contract call, send it, await the receipt."
pub struct EvmSubmitter {
    providers: Vec<DynProvider>,
    next: AtomicUsize,
}

impl EvmSubmitter {
    /// `private_keys` should be the same set configured for the network's
    /// [`crate::account_pool::AccountPool`]; which index submits a given
    /// call is otherwise independent of the pool's own round robin (see
    /// module docs).
    pub fn connect(rpc_url: &Url, private_keys: &[[u8; 32]]) -> Result<Self, String> {
        let providers = private_keys
            .iter()
            .map(|key| connect_signer(rpc_url, key).map(|(_, provider)| provider))
            .collect::<Result<Vec<_>, _>>()?;
        if providers.is_empty() {
            return Err("at least one signing account is required".to_string());
        }
        Ok(Self {
            providers,
            next: AtomicUsize::new(0),
        })
    }

    fn next_provider(&self) -> &DynProvider {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.providers.len();
        &self.providers[idx]
    }
}

async fn await_receipt(
    pending: Result<PendingTransactionBuilder<Ethereum>, alloy_contract::Error>,
) -> Result<ReceiptOutcome, ErrorReason> {
    let pending = pending.map_err(|_| ErrorReason::ContractCallError)?;
    let tx_hash = *pending.tx_hash();
    let receipt = pending
        .get_receipt()
        .await
        .map_err(|_| ErrorReason::RpcError)?;
    if receipt.status() {
        Ok(ReceiptOutcome::Success(tx_hash))
    } else {
        Ok(ReceiptOutcome::Reverted(tx_hash))
    }
}

impl Submitter for EvmSubmitter {
    async fn submit(
        &self,
        call: crate::settlement::SettlementCall,
    ) -> Result<ReceiptOutcome, ErrorReason> {
        let provider = self.next_provider();
        let contract = SettlementRouter::new(call.router, provider);
        let pending = contract
            .settleAndExecute(
                call.asset,
                call.from,
                call.value,
                call.valid_after,
                call.valid_before,
                call.nonce,
                Bytes::from(call.signature),
                call.salt,
                call.pay_to,
                call.facilitator_fee,
                call.hook,
                Bytes::from(call.hook_data),
            )
            .gas(call.gas_limit)
            .send()
            .await;
        await_receipt(pending).await
    }
}

impl LegacySubmitter for EvmSubmitter {
    async fn submit_transfer(
        &self,
        call: LegacyTransferCall,
    ) -> Result<ReceiptOutcome, ErrorReason> {
        let provider = self.next_provider();
        let contract = Eip3009::new(call.asset, provider);
        let pending = contract
            .transferWithAuthorization(
                call.from,
                call.to,
                call.value,
                call.valid_after,
                call.valid_before,
                call.nonce,
                Bytes::from(call.signature),
            )
            .gas(call.gas_limit)
            .send()
            .await;
        await_receipt(pending).await
    }
}

impl ClaimSubmitter for EvmSubmitter {
    async fn submit_claim(
        &self,
        router: Address,
        tokens: Vec<Address>,
    ) -> Result<ClaimOutcome, ErrorReason> {
        let provider = self.next_provider();
        let contract = SettlementRouter::new(router, provider);
        let pending = contract.claimFees(tokens).send().await;
        match await_receipt(pending).await? {
            ReceiptOutcome::Success(tx_hash) => Ok(ClaimOutcome::Success(tx_hash)),
            ReceiptOutcome::Reverted(_) => Ok(ClaimOutcome::Failed),
        }
    }
}
