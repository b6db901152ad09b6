//! HTTP endpoints (C14): the axum surface over [`Facilitator`].
//!
//! Route wiring and per-endpoint handler shape follow the teacher's
//! `handlers.rs` (`routes<A>()`, `get_verify_info`/`post_verify` pairing,
//! logging a warning before converting an `Err` into its response). The
//! fee-quote, pending-fees, and claim-fees handlers have no teacher
//! counterpart, since the teacher's facilitator never accrues router-held
//! fees.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::facilitator::Facilitator;
use crate::types::{ClaimFeesRequest, SettleRequest, VerifyRequest};

pub fn routes<A>() -> Router<A>
where
    A: Facilitator + Clone + Send + Sync + 'static,
    A::Error: IntoResponse,
{
    Router::new()
        .route("/", get(get_root))
        .route("/health", get(get_health::<A>))
        .route("/verify", get(get_verify_info))
        .route("/verify", post(post_verify::<A>))
        .route("/settle", get(get_settle_info))
        .route("/settle", post(post_settle::<A>))
        .route("/supported", get(get_supported::<A>))
        .route("/calculate-fee", get(get_calculate_fee::<A>))
        .route("/pending-fees", get(get_pending_fees::<A>))
        .route("/claim-fees", post(post_claim_fees::<A>))
}

#[instrument(skip_all)]
pub async fn get_root() -> impl IntoResponse {
    let pkg_name = env!("CARGO_PKG_NAME");
    (StatusCode::OK, format!("Hello from {pkg_name}!"))
}

#[instrument(skip_all)]
pub async fn get_verify_info() -> impl IntoResponse {
    Json(json!({
        "endpoint": "/verify",
        "description": "POST to verify an x402x router-settlement payment",
        "body": {
            "paymentPayload": "PaymentPayload",
            "paymentRequirements": "PaymentRequirements",
        }
    }))
}

#[instrument(skip_all)]
pub async fn get_settle_info() -> impl IntoResponse {
    Json(json!({
        "endpoint": "/settle",
        "description": "POST to settle an x402x router-settlement payment on-chain",
        "body": {
            "paymentPayload": "PaymentPayload",
            "paymentRequirements": "PaymentRequirements",
        }
    }))
}

#[instrument(skip_all)]
pub async fn get_supported<A>(State(facilitator): State<A>) -> impl IntoResponse
where
    A: Facilitator,
    A::Error: IntoResponse,
{
    match facilitator.supported().await {
        Ok(supported) => (StatusCode::OK, Json(supported)).into_response(),
        Err(error) => error.into_response(),
    }
}

/// `GET /health`: liveness plus a per-network summary (router address,
/// configured account count). Separate from `supported()`, which only
/// enumerates payment scheme/network/asset combinations the facilitator
/// accepts, not its own operational wiring.
#[instrument(skip_all)]
pub async fn get_health<A>(State(facilitator): State<A>) -> impl IntoResponse
where
    A: Facilitator,
    A::Error: IntoResponse,
{
    match facilitator.health().await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => error.into_response(),
    }
}

#[instrument(skip_all)]
pub async fn post_verify<A>(
    State(facilitator): State<A>,
    Json(body): Json<VerifyRequest>,
) -> impl IntoResponse
where
    A: Facilitator,
    A::Error: IntoResponse,
{
    match facilitator.verify(&body).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => {
            tracing::warn!(error = %error, network = %body.payment_payload.network, "verification failed");
            error.into_response()
        }
    }
}

#[instrument(skip_all)]
pub async fn post_settle<A>(
    State(facilitator): State<A>,
    Json(body): Json<SettleRequest>,
) -> impl IntoResponse
where
    A: Facilitator,
    A::Error: IntoResponse,
{
    match facilitator.settle(&body).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => {
            tracing::warn!(error = %error, network = %body.payment_payload.network, "settlement failed");
            error.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CalculateFeeQuery {
    pub network: String,
}

#[instrument(skip_all)]
pub async fn get_calculate_fee<A>(
    State(facilitator): State<A>,
    Query(query): Query<CalculateFeeQuery>,
) -> impl IntoResponse
where
    A: Facilitator,
    A::Error: IntoResponse,
{
    match facilitator.calculate_fee(&query.network).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => error.into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PendingFeesQuery {
    #[serde(default)]
    pub networks: Option<String>,
}

#[instrument(skip_all)]
pub async fn get_pending_fees<A>(
    State(facilitator): State<A>,
    Query(query): Query<PendingFeesQuery>,
) -> impl IntoResponse
where
    A: Facilitator,
    A::Error: IntoResponse,
{
    let networks: Option<Vec<String>> = query
        .networks
        .map(|csv| csv.split(',').map(str::to_string).collect());
    match facilitator.pending_fees(networks.as_deref()).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => error.into_response(),
    }
}

#[instrument(skip_all)]
pub async fn post_claim_fees<A>(
    State(facilitator): State<A>,
    Json(body): Json<ClaimFeesRequest>,
) -> impl IntoResponse
where
    A: Facilitator,
    A::Error: IntoResponse,
{
    match facilitator.claim_fees(&body).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => {
            tracing::warn!(error = %error, "fee claim sweep failed");
            error.into_response()
        }
    }
}
