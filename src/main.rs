//! x402x facilitator HTTP entrypoint.
//!
//! Mirrors the teacher's `main.rs`: `dotenv().ok()`, register telemetry,
//! load config, build provider-backed infrastructure, wire the facilitator
//! into `axum`, bind, and serve with graceful shutdown.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use axum::http::Method;
use axum::Router;
use dotenvy::dotenv;
use tower_http::cors;
use tower_http::trace::TraceLayer;

use x402x_facilitator::account_pool::AccountPool;
use x402x_facilitator::balance::BalanceChecker;
use x402x_facilitator::chain::{EvmReadClient, EvmSubmitter};
use x402x_facilitator::config::Config;
use x402x_facilitator::dispatch::{NetworkRuntime, RouterFacilitator};
use x402x_facilitator::handlers;
use x402x_facilitator::metrics::Metrics;
use x402x_facilitator::middleware::{self, RateLimiters};
use x402x_facilitator::network::NetworkRegistry;
use x402x_facilitator::price::{GasPriceCache, TokenPriceCache};
use x402x_facilitator::util::{SigDown, Telemetry};

type Facilitator = RouterFacilitator<EvmReadClient, EvmSubmitter, EvmReadClient, EvmSubmitter, EvmSubmitter, EvmReadClient>;

fn signer_address(private_key: &[u8; 32]) -> Result<Address, Box<dyn std::error::Error>> {
    let signer = PrivateKeySigner::from_bytes(&alloy_primitives::B256::from(*private_key))?;
    Ok(signer.address())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let _telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let config = Config::load();
    let network_configs = config.network_configs()?;
    let network_registry = Arc::new(NetworkRegistry::new(network_configs.clone()));

    let sig_down = SigDown::try_new()?;
    let shutdown_token = sig_down.cancellation_token();

    let private_key_bytes = config.private_key_bytes();
    let addresses: Vec<Address> = private_key_bytes
        .iter()
        .map(signer_address)
        .collect::<Result<Vec<_>, _>>()?;

    let gas_price_cache = Arc::new(GasPriceCache::new(Duration::from_secs(300), config.cache_max_keys, 1_500_000_000));
    let mut native_symbol_fallback = HashMap::new();
    for network in &network_configs {
        native_symbol_fallback
            .entry(network.native_token_symbol.clone())
            .or_insert(0.0_f64);
    }
    let token_price_cache = Arc::new(TokenPriceCache::new(
        config.cache_ttl_token_version(),
        config.cache_max_keys,
        native_symbol_fallback,
    ));
    let balance_checker = Arc::new(BalanceChecker::new(config.cache_ttl_token_version(), config.cache_max_keys));

    let mut runtimes = HashMap::new();
    let mut claimable_tokens = Vec::new();
    for network in &network_configs {
        let read_client = Arc::new(EvmReadClient::connect(&network.rpc_url));
        let submitter = Arc::new(EvmSubmitter::connect(&network.rpc_url, &private_key_bytes)?);

        gas_price_cache.clone().spawn_refresher(
            read_client.clone(),
            vec![network.chain_id],
            Duration::from_secs(60),
            shutdown_token.clone(),
        );

        let account_pool = AccountPool::new(addresses.clone(), config.account_pool_max_queue_depth, shutdown_token.clone());
        let claim_account_pool = AccountPool::new(addresses.clone(), config.account_pool_max_queue_depth, shutdown_token.clone());

        runtimes.insert(
            network.chain_id,
            NetworkRuntime {
                balance_source: read_client.clone(),
                submitter: submitter.clone(),
                pending_fees_source: read_client.clone(),
                claim_submitter: submitter.clone(),
                legacy_submitter: submitter,
                gas_estimator: read_client,
                account_pool,
                claim_account_pool,
            },
        );

        if !claimable_tokens.contains(&network.default_asset.address) {
            claimable_tokens.push(network.default_asset.address);
        }
    }

    let facilitator = Arc::new(RouterFacilitator::<EvmReadClient, EvmSubmitter, EvmReadClient, EvmSubmitter, EvmSubmitter, EvmReadClient> {
        network_registry: network_registry.clone(),
        runtimes,
        gas_config: config.gas_cost_config(),
        gas_strategy: config.gas_estimation_strategy()?,
        gas_price_cache,
        token_price_cache,
        balance_checker,
        min_facilitator_fee_usd: config.min_facilitator_fee_usd,
        max_facilitator_fee_usd: config.max_facilitator_fee_usd,
        strict_hook_whitelist: config.strict_hook_whitelist,
        settle_timeout: config.settle_timeout(),
        verify_timeout: config.verify_timeout(),
        min_claim_amount: config.min_claim_amount(),
        claimable_tokens,
        fee_quote_validity_seconds: 300,
        legacy_v1_enabled: config.facilitator_enable_v1,
    });

    let rate_limiters = Arc::new(RateLimiters::new(config.rate_limit_verify_max, config.rate_limit_settle_max));
    let metrics = Arc::new(Metrics::new());

    let http_endpoints = Router::new()
        .merge(handlers::routes::<Arc<Facilitator>>())
        .with_state(facilitator)
        .route_layer(axum::middleware::from_fn_with_state(rate_limiters, middleware::rate_limit))
        .route_layer(axum::middleware::from_fn_with_state(metrics, middleware::record_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        );

    let addr = SocketAddr::new(config.server_host, config.server_port);
    tracing::info!("starting x402x facilitator at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap_or_else(|e| {
        tracing::error!("failed to bind to {}: {}", addr, e);
        std::process::exit(1);
    });

    let graceful_shutdown_token = shutdown_token.clone();
    axum::serve(
        listener,
        http_endpoints.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { graceful_shutdown_token.cancelled().await })
    .await?;

    Ok(())
}
