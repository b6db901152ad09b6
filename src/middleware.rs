//! Per-IP rate limiting (§6 `RATE_LIMIT`) as `axum` middleware.
//!
//! Has no teacher counterpart (the teacher ships no rate limiting); grounded
//! in `governor`'s own keyed-limiter pattern — a `RateLimiter` over
//! `governor::state::keyed::DefaultKeyedStateStore<K>`, which is itself a
//! `DashMap` under the hood, matching the DashMap-backed caching idiom used
//! everywhere else in this crate ([`crate::cache::TtlCache`],
//! [`crate::network::NetworkRegistry`]'s resolution cache).

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::{Quota, RateLimiter};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::clock::DefaultClock;

use crate::errors::ErrorReason;
use crate::metrics::Metrics;

type KeyedLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// One bucket per rate-limited route, keyed by client IP.
pub struct RateLimiters {
    verify: KeyedLimiter,
    settle: KeyedLimiter,
}

impl RateLimiters {
    /// `verify_per_minute`/`settle_per_minute` come from `RATE_LIMIT_VERIFY_MAX`
    /// / `RATE_LIMIT_SETTLE_MAX` (§6).
    pub fn new(verify_per_minute: u32, settle_per_minute: u32) -> Self {
        Self {
            verify: RateLimiter::keyed(per_minute_quota(verify_per_minute)),
            settle: RateLimiter::keyed(per_minute_quota(settle_per_minute)),
        }
    }
}

fn per_minute_quota(max: u32) -> Quota {
    let max = NonZeroU32::new(max.max(1)).expect("max.max(1) is never zero");
    Quota::per_minute(max)
}

fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED))
}

async fn check(limiter: &KeyedLimiter, request: Request, next: Next) -> Response {
    let ip = client_ip(&request);
    match limiter.check_key(&ip) {
        Ok(()) => next.run(request).await,
        Err(_) => ErrorReason::QueueOverload.into_response(),
    }
}

/// Dispatches to the `/verify` or `/settle` bucket by path; every other
/// route is unmetered, matching §6's `RATE_LIMIT` scope.
pub async fn rate_limit(
    State(limiters): State<Arc<RateLimiters>>,
    request: Request,
    next: Next,
) -> Response {
    match request.uri().path() {
        "/verify" => check(&limiters.verify, request, next).await,
        "/settle" => check(&limiters.settle, request, next).await,
        _ => next.run(request).await,
    }
}

/// Times every request and records it under its route path, independent of
/// the facilitator's own per-network settlement metrics.
pub async fn record_metrics(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    let route = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    metrics.record_http(&route, response.status().is_success(), duration_ms);
    response
}
