//! Gas Estimation Strategy (C4).
//!
//! Follows the same code-path/simulation-path split as `alloy`'s own
//! `GasFiller` (see `layers::gas` in the provider crate): compute what can be
//! computed locally first (code path), and fall back to an RPC round trip
//! (`estimateGas`, simulation path) only when the hook is not one of our
//! built-ins or code-path validation is disabled.

use std::collections::HashMap;
use std::time::Duration;

use alloy_primitives::U256;
use alloy_sol_types::SolValue;
use serde::Serialize;

use crate::errors::ErrorReason;
use crate::hooks::transfer::TransferHookData;
use crate::network::BuiltinHookKind;

/// Strategy selection, configured per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasEstimationStrategy {
    Code,
    Simulation,
    Smart,
}

/// Static gas budget knobs, matching §6 defaults.
#[derive(Debug, Clone)]
pub struct GasCostConfig {
    pub min_gas_limit: u64,
    pub max_gas_limit: u64,
    pub safety_multiplier: f64,
    pub base_tx_cost: u64,
    pub base_hook_overhead: u64,
    pub per_transfer_overhead: u64,
    pub per_hook_overhead: HashMap<BuiltinHookKind, u64>,
    pub rpc_timeout: Duration,
    pub code_validation_enabled: bool,
}

impl Default for GasCostConfig {
    fn default() -> Self {
        let mut per_hook_overhead = HashMap::new();
        per_hook_overhead.insert(BuiltinHookKind::Transfer, 20_000);
        per_hook_overhead.insert(BuiltinHookKind::RevenueSplit, 25_000);
        per_hook_overhead.insert(BuiltinHookKind::NftMint, 80_000);
        per_hook_overhead.insert(BuiltinHookKind::Reward, 30_000);
        Self {
            min_gas_limit: 150_000,
            max_gas_limit: 5_000_000,
            safety_multiplier: 1.5,
            base_tx_cost: 100_000,
            base_hook_overhead: 20_000,
            per_transfer_overhead: 8_000,
            per_hook_overhead,
            rpc_timeout: Duration::from_secs(5),
            code_validation_enabled: true,
        }
    }
}

/// Which strategy actually produced the estimate, surfaced to callers/metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyUsed {
    Code,
    Simulation,
    FallbackStatic,
}

#[derive(Debug, Clone, Serialize)]
pub struct GasEstimateMetadata {
    pub hook_overhead: Option<u64>,
    pub recipient_count: Option<usize>,
    pub rpc_estimate: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct GasEstimate {
    pub gas_limit: u64,
    pub is_valid: bool,
    pub error_reason: Option<ErrorReason>,
    pub strategy_used: StrategyUsed,
    pub metadata: GasEstimateMetadata,
}

impl GasEstimate {
    fn invalid(reason: ErrorReason, strategy_used: StrategyUsed) -> Self {
        Self {
            gas_limit: 0,
            is_valid: false,
            error_reason: Some(reason),
            strategy_used,
            metadata: GasEstimateMetadata {
                hook_overhead: None,
                recipient_count: None,
                rpc_estimate: None,
            },
        }
    }
}

fn clamp(gas: u64, config: &GasCostConfig) -> u64 {
    gas.clamp(config.min_gas_limit, config.max_gas_limit)
}

/// Parameters describing the proposed settlement call, independent of how
/// gas for it is estimated.
#[derive(Debug, Clone)]
pub struct SettlementCallParams {
    pub hook_kind: Option<BuiltinHookKind>,
    pub hook_data: Vec<u8>,
}

/// Code-path estimation: only valid for built-in hooks. Computes
/// `baseTxCost + perHookOverhead(hookType, hookData)`, clamped.
pub fn estimate_via_code(
    params: &SettlementCallParams,
    config: &GasCostConfig,
) -> GasEstimate {
    let Some(hook_kind) = params.hook_kind else {
        return GasEstimate::invalid(ErrorReason::GasEstimationError, StrategyUsed::Code);
    };

    let base_overhead = config
        .per_hook_overhead
        .get(&hook_kind)
        .copied()
        .unwrap_or(config.base_hook_overhead);

    let (overhead, recipient_count) = if hook_kind == BuiltinHookKind::Transfer
        && !params.hook_data.is_empty()
    {
        match TransferHookData::abi_decode(&params.hook_data) {
            Ok(decoded) => {
                let count = decoded.recipients.len();
                (
                    base_overhead + config.per_transfer_overhead * count as u64,
                    Some(count),
                )
            }
            Err(_) => {
                return GasEstimate::invalid(ErrorReason::DecodingError, StrategyUsed::Code);
            }
        }
    } else {
        (base_overhead, None)
    };

    let gas_limit = clamp(config.base_tx_cost + overhead, config);
    GasEstimate {
        gas_limit,
        is_valid: true,
        error_reason: None,
        strategy_used: StrategyUsed::Code,
        metadata: GasEstimateMetadata {
            hook_overhead: Some(overhead),
            recipient_count,
            rpc_estimate: None,
        },
    }
}

/// Simulation-path estimation: the caller supplies an async `estimate_gas`
/// closure (typically `Provider::estimate_gas` against the router's
/// `settleAndExecute` call) so this module stays provider-agnostic and
/// testable without a live RPC endpoint.
///
/// On RPC timeout, falls back to a static conservative gas limit rather than
/// surfacing the error, matching §4.4's "timeout... falls back to a static
/// conservative gas limit" — this applies whenever the simulation path runs,
/// not only when it's reached through the `Smart` strategy.
pub async fn estimate_via_simulation<F, Fut>(
    config: &GasCostConfig,
    estimate_gas: F,
) -> GasEstimate
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<u64, ErrorReason>>,
{
    let result = tokio::time::timeout(config.rpc_timeout, estimate_gas()).await;
    let raw = match result {
        Ok(Ok(raw)) => raw,
        Ok(Err(reason)) => return GasEstimate::invalid(reason, StrategyUsed::Simulation),
        Err(_) => {
            return GasEstimate {
                gas_limit: clamp(config.base_tx_cost + config.base_hook_overhead, config),
                is_valid: true,
                error_reason: None,
                strategy_used: StrategyUsed::FallbackStatic,
                metadata: GasEstimateMetadata {
                    hook_overhead: None,
                    recipient_count: None,
                    rpc_estimate: None,
                },
            };
        }
    };

    let scaled = (raw as f64 * config.safety_multiplier).ceil() as u64;
    let gas_limit = clamp(scaled, config);
    GasEstimate {
        gas_limit,
        is_valid: true,
        error_reason: None,
        strategy_used: StrategyUsed::Simulation,
        metadata: GasEstimateMetadata {
            hook_overhead: None,
            recipient_count: None,
            rpc_estimate: Some(raw),
        },
    }
}

/// Smart path: code path when the hook is a configured built-in and code
/// validation is enabled; simulation otherwise (which itself falls back to a
/// static limit on RPC timeout, see [`estimate_via_simulation`]).
pub async fn estimate<F, Fut>(
    strategy: GasEstimationStrategy,
    params: &SettlementCallParams,
    config: &GasCostConfig,
    estimate_gas: F,
) -> GasEstimate
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<u64, ErrorReason>>,
{
    match strategy {
        GasEstimationStrategy::Code => estimate_via_code(params, config),
        GasEstimationStrategy::Simulation => {
            estimate_via_simulation(config, estimate_gas).await
        }
        GasEstimationStrategy::Smart => {
            let is_builtin = params.hook_kind.is_some();
            if is_builtin && config.code_validation_enabled {
                estimate_via_code(params, config)
            } else {
                estimate_via_simulation(config, estimate_gas).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_path_scales_with_recipient_count() {
        let config = GasCostConfig::default();
        let single = SettlementCallParams {
            hook_kind: Some(BuiltinHookKind::Transfer),
            hook_data: vec![],
        };
        let single_estimate = estimate_via_code(&single, &config);
        assert!(single_estimate.is_valid);

        let data = TransferHookData {
            recipients: vec![
                alloy_primitives::Address::repeat_byte(1),
                alloy_primitives::Address::repeat_byte(2),
                alloy_primitives::Address::repeat_byte(3),
            ],
            amounts: vec![U256::from(1u64), U256::from(1u64), U256::from(1u64)],
        };
        let multi = SettlementCallParams {
            hook_kind: Some(BuiltinHookKind::Transfer),
            hook_data: data.abi_encode(),
        };
        let multi_estimate = estimate_via_code(&multi, &config);
        assert!(multi_estimate.gas_limit > single_estimate.gas_limit);
    }

    #[test]
    fn code_path_clamps_to_max() {
        let mut config = GasCostConfig::default();
        config.max_gas_limit = 150_000;
        let params = SettlementCallParams {
            hook_kind: Some(BuiltinHookKind::NftMint),
            hook_data: vec![],
        };
        let estimate = estimate_via_code(&params, &config);
        assert_eq!(estimate.gas_limit, 150_000);
    }

    #[tokio::test]
    async fn simulation_path_applies_safety_multiplier() {
        let config = GasCostConfig::default();
        let estimate = estimate_via_simulation(&config, || async { Ok(200_000u64) }).await;
        assert!(estimate.is_valid);
        assert_eq!(estimate.gas_limit, 300_000);
    }

    #[tokio::test]
    async fn simulation_path_times_out_gracefully() {
        let mut config = GasCostConfig::default();
        config.rpc_timeout = Duration::from_millis(10);
        let estimate = estimate_via_simulation(&config, || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1u64)
        })
        .await;
        assert!(estimate.is_valid);
        assert_eq!(estimate.strategy_used, StrategyUsed::FallbackStatic);
        assert_eq!(estimate.gas_limit, clamp(config.base_tx_cost + config.base_hook_overhead, &config));
    }

    #[tokio::test]
    async fn plain_simulation_strategy_falls_back_on_timeout() {
        let mut config = GasCostConfig::default();
        config.rpc_timeout = Duration::from_millis(10);
        let params = SettlementCallParams {
            hook_kind: None,
            hook_data: vec![],
        };
        let estimate = estimate(GasEstimationStrategy::Simulation, &params, &config, || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1u64)
        })
        .await;
        assert!(estimate.is_valid);
        assert_eq!(estimate.strategy_used, StrategyUsed::FallbackStatic);
    }

    #[tokio::test]
    async fn smart_path_prefers_code_for_builtin_hooks() {
        let config = GasCostConfig::default();
        let params = SettlementCallParams {
            hook_kind: Some(BuiltinHookKind::Transfer),
            hook_data: vec![],
        };
        let estimate = estimate(GasEstimationStrategy::Smart, &params, &config, || async {
            panic!("simulation should not be invoked for a built-in hook");
        })
        .await;
        assert_eq!(estimate.strategy_used, StrategyUsed::Code);
    }

    #[tokio::test]
    async fn smart_path_falls_back_to_simulation_for_custom_hooks() {
        let config = GasCostConfig::default();
        let params = SettlementCallParams {
            hook_kind: None,
            hook_data: vec![],
        };
        let estimate = estimate(GasEstimationStrategy::Smart, &params, &config, || async {
            Ok(400_000u64)
        })
        .await;
        assert_eq!(estimate.strategy_used, StrategyUsed::Simulation);
    }
}
