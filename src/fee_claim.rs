//! Fee Claim Module (C10): sweeps accrued facilitator fees off the router.
//!
//! Submission shape mirrors [`crate::settlement`]'s account-pool dispatch;
//! there is no teacher counterpart, since the teacher's facilitator calls
//! `transferWithAuthorization` directly and never accrues router-held fees.

use std::future::Future;
use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};

use crate::account_pool::AccountPool;
use crate::errors::ErrorReason;
use crate::network::NetworkConfig;
use crate::types::{ClaimResult, ClaimStatus, EvmAddress, TokenAmount, TransactionHash};

/// Reads a facilitator's pending, unclaimed fee balance for one token on one
/// router. Implemented over [`crate::router_abi::SettlementRouter::getPendingFeesCall`]
/// in production.
pub trait PendingFeesSource: Send + Sync + 'static {
    fn fetch_pending_fees(
        &self,
        router: Address,
        facilitator: Address,
        token: Address,
    ) -> impl Future<Output = Result<U256, String>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Success(B256),
    Failed,
}

/// Submits a `claimFees` call and awaits its receipt. Implemented over an
/// `alloy` provider/contract instance bound to
/// [`crate::router_abi::SettlementRouter`] in production.
pub trait ClaimSubmitter: Send + Sync + 'static {
    fn submit_claim(
        &self,
        router: Address,
        tokens: Vec<Address>,
    ) -> impl Future<Output = Result<ClaimOutcome, ErrorReason>> + Send;
}

/// One network's signing accounts and router, scoped down from the full
/// registry for a claim sweep.
pub struct ClaimTarget<'a> {
    pub network: &'a NetworkConfig,
    pub account_pool: &'a AccountPool<Result<ClaimOutcome, ErrorReason>>,
}

/// Runs the sweep: for each target network, for each of its signing
/// accounts, for each candidate token, reads pending fees and keeps what
/// clears `min_claim_amount`, then submits one `claimFees` call per
/// `(facilitator, network)` group carrying every qualifying token.
///
/// Overall success is true iff every attempted group succeeded and at least
/// one group was attempted — a network with nothing above the claim floor
/// is skipped, not failed, and skips alone do not make the sweep a success.
pub async fn claim_fees<P, S>(
    targets: &[ClaimTarget<'_>],
    tokens: &[Address],
    min_claim_amount: U256,
    pending_fees_source: &P,
    claim_submitter: Arc<S>,
) -> (bool, Vec<ClaimResult>)
where
    P: PendingFeesSource,
    S: ClaimSubmitter,
{
    let mut results = Vec::new();
    let mut attempted = false;

    for target in targets {
        for facilitator in target.account_pool.addresses() {
            let mut qualifying = Vec::new();
            let mut total = U256::ZERO;
            for &token in tokens {
                match pending_fees_source
                    .fetch_pending_fees(target.network.settlement_router_address, facilitator, token)
                    .await
                {
                    Ok(amount) if amount >= min_claim_amount => {
                        qualifying.push(token);
                        total += amount;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(
                            network = %target.network.human_name,
                            %facilitator,
                            %token,
                            error = %err,
                            "pending fee lookup failed, skipping token for this sweep"
                        );
                    }
                }
            }

            if qualifying.is_empty() {
                results.push(ClaimResult {
                    network: target.network.human_name.clone(),
                    facilitator_address: EvmAddress(facilitator),
                    status: ClaimStatus::Skipped,
                    transaction: None,
                    claimed_tokens: Vec::new(),
                    total_claimed: TokenAmount(0),
                });
                continue;
            }

            attempted = true;
            let router = target.network.settlement_router_address;
            let submitter = claim_submitter.clone();
            let claim_tokens = qualifying.clone();
            let submission = target
                .account_pool
                .enqueue_on(facilitator, move || async move {
                    submitter.submit_claim(router, claim_tokens).await
                })
                .await;

            let claimed_tokens: Vec<EvmAddress> = qualifying.into_iter().map(EvmAddress).collect();

            match submission {
                Ok(Ok(ClaimOutcome::Success(tx_hash))) => {
                    results.push(ClaimResult {
                        network: target.network.human_name.clone(),
                        facilitator_address: EvmAddress(facilitator),
                        status: ClaimStatus::Success,
                        transaction: Some(TransactionHash::from(tx_hash)),
                        claimed_tokens,
                        total_claimed: TokenAmount(u64::try_from(total).unwrap_or(u64::MAX)),
                    });
                }
                Ok(Ok(ClaimOutcome::Failed)) | Ok(Err(_)) | Err(_) => {
                    results.push(ClaimResult {
                        network: target.network.human_name.clone(),
                        facilitator_address: EvmAddress(facilitator),
                        status: ClaimStatus::Failed,
                        transaction: None,
                        claimed_tokens,
                        total_claimed: TokenAmount(0),
                    });
                }
            }
        }
    }

    let success = attempted && results.iter().all(|r| r.status != ClaimStatus::Failed);
    (success, results)
}
