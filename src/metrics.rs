//! Process-wide settlement/verification counters and histograms.
//!
//! Has no teacher counterpart (the teacher exports traces only), but reuses
//! exactly the meter provider [`crate::util::Telemetry`] already registers
//! globally via `opentelemetry::global::set_meter_provider` — instruments
//! here are pulled from `opentelemetry::global::meter`, the same global
//! accessor `tracing-opentelemetry`'s `MetricsLayer` feeds into the same
//! provider.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram};

/// Instruments recorded across a settle/verify/claim call. Cheap to clone
/// (every instrument handle is an `Arc` internally), so one instance is
/// built at startup and shared via the facilitator's `State`.
#[derive(Clone)]
pub struct Metrics {
    verify_total: Counter<u64>,
    verify_rejected_total: Counter<u64>,
    settle_total: Counter<u64>,
    settle_failed_total: Counter<u64>,
    settle_duration_ms: Histogram<f64>,
    gas_used: Histogram<u64>,
    claim_total: Counter<u64>,
    claim_amount: Counter<u64>,
    http_requests_total: Counter<u64>,
    http_duration_ms: Histogram<f64>,
}

impl Metrics {
    pub fn new() -> Self {
        let meter = opentelemetry::global::meter(env!("CARGO_PKG_NAME"));
        Self {
            verify_total: meter.u64_counter("x402x.verify.total").build(),
            verify_rejected_total: meter.u64_counter("x402x.verify.rejected_total").build(),
            settle_total: meter.u64_counter("x402x.settle.total").build(),
            settle_failed_total: meter.u64_counter("x402x.settle.failed_total").build(),
            settle_duration_ms: meter.f64_histogram("x402x.settle.duration_ms").build(),
            gas_used: meter.u64_histogram("x402x.settle.gas_used").build(),
            claim_total: meter.u64_counter("x402x.claim.total").build(),
            claim_amount: meter.u64_counter("x402x.claim.amount").build(),
            http_requests_total: meter.u64_counter("x402x.http.requests_total").build(),
            http_duration_ms: meter.f64_histogram("x402x.http.duration_ms").build(),
        }
    }

    pub fn record_verify(&self, network: &str, accepted: bool) {
        let attrs = [KeyValue::new("network", network.to_string())];
        self.verify_total.add(1, &attrs);
        if !accepted {
            self.verify_rejected_total.add(1, &attrs);
        }
    }

    pub fn record_settle(&self, network: &str, success: bool, duration_ms: f64, gas_used: Option<u64>) {
        let attrs = [KeyValue::new("network", network.to_string())];
        self.settle_total.add(1, &attrs);
        if !success {
            self.settle_failed_total.add(1, &attrs);
        }
        self.settle_duration_ms.record(duration_ms, &attrs);
        if let Some(gas_used) = gas_used {
            self.gas_used.record(gas_used, &attrs);
        }
    }

    /// Route-level HTTP timing, recorded by the `axum` middleware layer
    /// ([`crate::middleware::record_metrics`]) independent of the
    /// facilitator's own per-network settlement metrics above.
    pub fn record_http(&self, route: &str, status_success: bool, duration_ms: f64) {
        let attrs = [
            KeyValue::new("route", route.to_string()),
            KeyValue::new("success", status_success),
        ];
        self.http_requests_total.add(1, &attrs);
        self.http_duration_ms.record(duration_ms, &attrs);
    }

    pub fn record_claim(&self, network: &str, success: bool, amount: u64) {
        let attrs = [KeyValue::new("network", network.to_string())];
        if success {
            self.claim_total.add(1, &attrs);
            self.claim_amount.add(amount, &attrs);
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
