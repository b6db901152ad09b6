//! Router-settlement dispatch (C11): the concrete [`Facilitator`] wiring the
//! Network Registry, Verification Pipeline, Settlement Engine, and Fee Claim
//! module into the operations the HTTP surface calls.
//!
//! Has no single teacher counterpart — the teacher's `FacilitatorLocal`
//! (`facilitator_local.rs`) plays the same connective role for its simpler,
//! non-router payload, so this module follows its shape: one struct holding
//! everything needed to answer `verify`/`settle`, with per-network state
//! keyed by chain.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};

use crate::account_pool::AccountPool;
use crate::balance::{BalanceChecker, BalanceSource};
use crate::chain_id::ChainId;
use crate::errors::ErrorReason;
use crate::facilitator::Facilitator;
use crate::fee_claim::{self, ClaimOutcome, ClaimSubmitter, ClaimTarget, PendingFeesSource};
use crate::gas::{GasCostConfig, GasEstimationStrategy};
use crate::network::NetworkRegistry;
use crate::price::{GasPriceCache, TokenPriceCache};
use crate::settlement::{self, LegacySubmitter, ReceiptOutcome, Submitter};
use crate::types::{
    CalculateFeeResponse, ClaimFeesRequest, ClaimFeesResponse, ClaimStatus, EvmAddress,
    HealthNetworkSummary, HealthResponse, PendingFeeEntry, PendingFeesResponse, Scheme,
    SettleRequest, SettleResponse, SupportedKind, SupportedResponse, TokenAmount, VerifyRequest,
    VerifyResponse, X402Version,
};
use crate::verification::{self, VerificationContext};

/// Simulates gas for a settle request against the router's
/// `settleAndExecute`, for [`GasEstimationStrategy::Simulation`]/`Smart`'s
/// RPC round trip. Implemented over `Provider::estimate_gas` in production.
pub trait GasEstimator: Send + Sync + 'static {
    fn estimate_gas(
        &self,
        request: SettleRequest,
    ) -> impl Future<Output = Result<u64, ErrorReason>> + Send;
}

/// One network's signing infrastructure: balance/fee/gas RPC sources plus
/// the dedicated account pools for settlement and fee-claim submissions.
pub struct NetworkRuntime<B, S, P, C, L, G> {
    pub balance_source: Arc<B>,
    pub submitter: Arc<S>,
    pub pending_fees_source: Arc<P>,
    pub claim_submitter: Arc<C>,
    pub legacy_submitter: Arc<L>,
    pub gas_estimator: Arc<G>,
    pub account_pool: AccountPool<Result<ReceiptOutcome, ErrorReason>>,
    pub claim_account_pool: AccountPool<Result<ClaimOutcome, ErrorReason>>,
}

/// The full facilitator: one [`NetworkRuntime`] per configured chain plus
/// the shared policy knobs (gas strategy, fee floor, hook whitelist mode).
pub struct RouterFacilitator<B, S, P, C, L, G> {
    pub network_registry: Arc<NetworkRegistry>,
    pub runtimes: HashMap<ChainId, NetworkRuntime<B, S, P, C, L, G>>,
    pub gas_config: GasCostConfig,
    pub gas_strategy: GasEstimationStrategy,
    pub gas_price_cache: Arc<GasPriceCache>,
    pub token_price_cache: Arc<TokenPriceCache>,
    pub balance_checker: Arc<BalanceChecker>,
    pub min_facilitator_fee_usd: f64,
    pub max_facilitator_fee_usd: f64,
    pub strict_hook_whitelist: bool,
    pub settle_timeout: Duration,
    pub verify_timeout: Duration,
    pub min_claim_amount: U256,
    pub claimable_tokens: Vec<Address>,
    pub fee_quote_validity_seconds: u64,
    /// `FACILITATOR_ENABLE_V2`'s counterpart: whether the legacy v1
    /// non-router payload shape is still accepted alongside v2.
    pub legacy_v1_enabled: bool,
}

impl<B, S, P, C, L, G> RouterFacilitator<B, S, P, C, L, G>
where
    B: BalanceSource,
    S: Submitter,
    P: PendingFeesSource,
    C: ClaimSubmitter,
    L: LegacySubmitter,
    G: GasEstimator,
{
    fn verification_ctx(&self) -> VerificationContext<'_> {
        VerificationContext {
            network_registry: &self.network_registry,
            balance_checker: &self.balance_checker,
            token_price_cache: &self.token_price_cache,
            min_facilitator_fee_usd: self.min_facilitator_fee_usd,
            max_facilitator_fee_usd: self.max_facilitator_fee_usd,
            strict_hook_whitelist: self.strict_hook_whitelist,
            verify_timeout: self.verify_timeout,
        }
    }
}

impl<B, S, P, C, L, G> Facilitator for RouterFacilitator<B, S, P, C, L, G>
where
    B: BalanceSource,
    S: Submitter,
    P: PendingFeesSource,
    C: ClaimSubmitter,
    L: LegacySubmitter,
    G: GasEstimator,
{
    type Error = ErrorReason;

    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, ErrorReason> {
        let Ok(network) = self
            .network_registry
            .resolve(&request.payment_payload.network)
        else {
            return Ok(VerifyResponse {
                is_valid: false,
                invalid_reason: Some(ErrorReason::UnsupportedNetwork),
                payer: None,
            });
        };
        let Some(runtime) = self.runtimes.get(&network.chain_id) else {
            return Ok(VerifyResponse {
                is_valid: false,
                invalid_reason: Some(ErrorReason::UnsupportedNetwork),
                payer: None,
            });
        };
        let ctx = self.verification_ctx();

        match request.payment_payload.x402_version {
            X402Version::V1 if !self.legacy_v1_enabled => Ok(VerifyResponse {
                is_valid: false,
                invalid_reason: Some(ErrorReason::UnsupportedNetwork),
                payer: None,
            }),
            X402Version::V1 => {
                match verification::verify_payment_v1(
                    &ctx,
                    runtime.balance_source.as_ref(),
                    &request.payment_payload,
                    &request.payment_requirements,
                )
                .await
                {
                    Ok(verified) => Ok(VerifyResponse {
                        is_valid: true,
                        invalid_reason: None,
                        payer: Some(EvmAddress(verified.payer)),
                    }),
                    Err(reason) => Ok(VerifyResponse {
                        is_valid: false,
                        invalid_reason: Some(reason),
                        payer: None,
                    }),
                }
            }
            X402Version::V2 => {
                match verification::verify_payment(
                    &ctx,
                    runtime.balance_source.as_ref(),
                    &request.payment_payload,
                    &request.payment_requirements,
                )
                .await
                {
                    Ok(verified) => Ok(VerifyResponse {
                        is_valid: true,
                        invalid_reason: None,
                        payer: Some(EvmAddress(verified.payer)),
                    }),
                    Err(reason) => Ok(VerifyResponse {
                        is_valid: false,
                        invalid_reason: Some(reason),
                        payer: None,
                    }),
                }
            }
        }
    }

    async fn settle(&self, request: &SettleRequest) -> Result<SettleResponse, ErrorReason> {
        let network_name = request.payment_payload.network.clone();
        let Ok(network) = self.network_registry.resolve(&network_name) else {
            return Ok(SettleResponse {
                success: false,
                error_reason: Some(ErrorReason::UnsupportedNetwork),
                payer: None,
                transaction: None,
                network: network_name,
            });
        };
        let Some(runtime) = self.runtimes.get(&network.chain_id) else {
            return Ok(SettleResponse {
                success: false,
                error_reason: Some(ErrorReason::UnsupportedNetwork),
                payer: None,
                transaction: None,
                network: network_name,
            });
        };
        let ctx = self.verification_ctx();

        if request.payment_payload.x402_version == X402Version::V1 {
            if !self.legacy_v1_enabled {
                return Ok(SettleResponse {
                    success: false,
                    error_reason: Some(ErrorReason::UnsupportedNetwork),
                    payer: None,
                    transaction: None,
                    network: network_name,
                });
            }
            let outcome = settlement::settle_v1(
                &ctx,
                runtime.balance_source.as_ref(),
                &self.gas_config,
                &runtime.account_pool,
                runtime.legacy_submitter.clone(),
                self.settle_timeout,
                &request.payment_payload,
                &request.payment_requirements,
            )
            .await;
            return Ok(SettleResponse {
                success: outcome.success,
                error_reason: outcome.error_reason,
                payer: outcome.payer.map(EvmAddress),
                transaction: outcome.transaction,
                network: network_name,
            });
        }

        let gas_estimator = runtime.gas_estimator.clone();
        let request_for_gas = request.clone();
        let (outcome, metrics) = settlement::settle_payment(
            &ctx,
            runtime.balance_source.as_ref(),
            &self.gas_config,
            self.gas_strategy,
            &self.gas_price_cache,
            &self.token_price_cache,
            &runtime.account_pool,
            runtime.submitter.clone(),
            self.settle_timeout,
            &request.payment_payload,
            &request.payment_requirements,
            move || async move { gas_estimator.estimate_gas(request_for_gas).await },
        )
        .await;

        if let Some(metrics) = metrics {
            tracing::info!(
                network = %network.human_name,
                gas_used = metrics.gas_used,
                gas_cost_usd = metrics.gas_cost_usd,
                facilitator_fee_usd = metrics.facilitator_fee_usd,
                profit_usd = metrics.profit_usd,
                success = outcome.success,
                "settlement completed"
            );
        }

        Ok(SettleResponse {
            success: outcome.success,
            error_reason: outcome.error_reason,
            payer: outcome.payer.map(EvmAddress),
            transaction: outcome.transaction,
            network: network_name,
        })
    }

    async fn supported(&self) -> Result<SupportedResponse, ErrorReason> {
        let mut kinds = Vec::new();
        for network in self.network_registry.all() {
            kinds.push(SupportedKind {
                x402_version: X402Version::V2,
                scheme: Scheme::Exact,
                network: network.human_name.clone(),
            });
            if self.legacy_v1_enabled {
                kinds.push(SupportedKind {
                    x402_version: X402Version::V1,
                    scheme: Scheme::Exact,
                    network: network.human_name.clone(),
                });
            }
        }
        Ok(SupportedResponse { kinds })
    }

    async fn health(&self) -> Result<HealthResponse, ErrorReason> {
        let mut networks = Vec::with_capacity(self.runtimes.len());
        for network in self.network_registry.all() {
            let Some(runtime) = self.runtimes.get(&network.chain_id) else {
                continue;
            };
            networks.push(HealthNetworkSummary {
                network: network.human_name.clone(),
                chain_id: network.chain_id.reference(),
                router: EvmAddress(network.settlement_router_address),
                accounts: runtime.account_pool.addresses().len(),
            });
        }
        Ok(HealthResponse {
            status: "ok",
            networks,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    async fn calculate_fee(&self, network: &str) -> Result<CalculateFeeResponse, ErrorReason> {
        let resolved = self.network_registry.resolve(network)?;
        let decimals = resolved.default_asset.decimals as i32;
        let atomic_units =
            (self.min_facilitator_fee_usd * 10f64.powi(decimals)).ceil().max(0.0) as u64;
        Ok(CalculateFeeResponse {
            network: resolved.human_name.clone(),
            minimum_facilitator_fee: TokenAmount(atomic_units),
            valid_for_seconds: self.fee_quote_validity_seconds,
        })
    }

    async fn pending_fees(
        &self,
        networks: Option<&[String]>,
    ) -> Result<PendingFeesResponse, ErrorReason> {
        let names: Vec<String> = match networks {
            Some(list) => list.to_vec(),
            None => self
                .network_registry
                .all()
                .map(|network| network.human_name.clone())
                .collect(),
        };

        let mut fees = Vec::new();
        for name in &names {
            let Ok(network) = self.network_registry.resolve(name) else {
                continue;
            };
            let Some(runtime) = self.runtimes.get(&network.chain_id) else {
                continue;
            };
            for facilitator in runtime.account_pool.addresses() {
                for &token in &self.claimable_tokens {
                    match runtime
                        .pending_fees_source
                        .fetch_pending_fees(network.settlement_router_address, facilitator, token)
                        .await
                    {
                        Ok(amount) if !amount.is_zero() => {
                            fees.push(PendingFeeEntry {
                                network: network.human_name.clone(),
                                router: EvmAddress(network.settlement_router_address),
                                token: EvmAddress(token),
                                facilitator_address: EvmAddress(facilitator),
                                amount: TokenAmount(u64::try_from(amount).unwrap_or(u64::MAX)),
                            });
                        }
                        Ok(_) => {}
                        Err(err) => {
                            tracing::warn!(
                                network = %network.human_name,
                                %facilitator,
                                %token,
                                error = %err,
                                "pending fee lookup failed"
                            );
                        }
                    }
                }
            }
        }
        Ok(PendingFeesResponse { fees })
    }

    async fn claim_fees(
        &self,
        request: &ClaimFeesRequest,
    ) -> Result<ClaimFeesResponse, ErrorReason> {
        let tokens: Vec<Address> = match &request.tokens {
            Some(list) => list
                .iter()
                .cloned()
                .map(Address::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| ErrorReason::InvalidAddress)?,
            None => self.claimable_tokens.clone(),
        };
        let names: Vec<String> = match &request.networks {
            Some(list) => list.clone(),
            None => self
                .network_registry
                .all()
                .map(|network| network.human_name.clone())
                .collect(),
        };

        let mut results = Vec::new();
        for name in &names {
            let Ok(network) = self.network_registry.resolve(name) else {
                continue;
            };
            let Some(runtime) = self.runtimes.get(&network.chain_id) else {
                continue;
            };
            let target = ClaimTarget {
                network: network.as_ref(),
                account_pool: &runtime.claim_account_pool,
            };
            let (_, network_results) = fee_claim::claim_fees(
                std::slice::from_ref(&target),
                &tokens,
                self.min_claim_amount,
                runtime.pending_fees_source.as_ref(),
                runtime.claim_submitter.clone(),
            )
            .await;
            results.extend(network_results);
        }

        let attempted = results.iter().any(|r| r.status != ClaimStatus::Skipped);
        let success = attempted && results.iter().all(|r| r.status != ClaimStatus::Failed);
        let total_claimed = results
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.total_claimed.0));

        Ok(ClaimFeesResponse {
            success,
            claims: results,
            total_claimed: TokenAmount(total_claimed),
        })
    }
}
