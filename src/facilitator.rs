//! The `Facilitator` trait: the seam the HTTP surface is built against.
//! Grounded in the teacher's `src/facilitator.rs`, including the blanket
//! `Arc<T>` delegation that lets `axum`'s `State` hold a cheaply-cloneable
//! handle to one shared facilitator instance.

use std::future::Future;
use std::sync::Arc;

use crate::types::{
    CalculateFeeResponse, ClaimFeesRequest, ClaimFeesResponse, HealthResponse,
    PendingFeesResponse, SettleRequest, SettleResponse, SupportedResponse, VerifyRequest,
    VerifyResponse,
};

pub trait Facilitator {
    type Error: std::fmt::Debug + std::fmt::Display;

    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send;

    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send;

    fn supported(&self) -> impl Future<Output = Result<SupportedResponse, Self::Error>> + Send;

    /// Liveness plus a per-network summary (router address, configured
    /// account count) for `/health`.
    fn health(&self) -> impl Future<Output = Result<HealthResponse, Self::Error>> + Send;

    fn calculate_fee(
        &self,
        network: &str,
    ) -> impl Future<Output = Result<CalculateFeeResponse, Self::Error>> + Send;

    fn pending_fees(
        &self,
        networks: Option<&[String]>,
    ) -> impl Future<Output = Result<PendingFeesResponse, Self::Error>> + Send;

    fn claim_fees(
        &self,
        request: &ClaimFeesRequest,
    ) -> impl Future<Output = Result<ClaimFeesResponse, Self::Error>> + Send;
}

impl<T: Facilitator + Send + Sync> Facilitator for Arc<T> {
    type Error = T::Error;

    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send {
        self.as_ref().verify(request)
    }

    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send {
        self.as_ref().settle(request)
    }

    fn supported(&self) -> impl Future<Output = Result<SupportedResponse, Self::Error>> + Send {
        self.as_ref().supported()
    }

    fn health(&self) -> impl Future<Output = Result<HealthResponse, Self::Error>> + Send {
        self.as_ref().health()
    }

    fn calculate_fee(
        &self,
        network: &str,
    ) -> impl Future<Output = Result<CalculateFeeResponse, Self::Error>> + Send {
        self.as_ref().calculate_fee(network)
    }

    fn pending_fees(
        &self,
        networks: Option<&[String]>,
    ) -> impl Future<Output = Result<PendingFeesResponse, Self::Error>> + Send {
        self.as_ref().pending_fees(networks)
    }

    fn claim_fees(
        &self,
        request: &ClaimFeesRequest,
    ) -> impl Future<Output = Result<ClaimFeesResponse, Self::Error>> + Send {
        self.as_ref().claim_fees(request)
    }
}
