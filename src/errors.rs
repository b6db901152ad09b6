//! Error taxonomy shared across verification, settlement, and the HTTP surface.
//!
//! `ErrorReason` follows the teacher's `facilitator::ErrorReason`: a flat
//! `serde`-tagged enum whose `Display` impl renders the `snake_case` wire name
//! by round-tripping through `serde_json` and stripping the quotes, so the
//! same value is usable in JSON bodies, log fields, and metric labels without
//! a second naming scheme.

use axum::Json;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The full set of validation, settlement, decoding, and backpressure error
/// codes a client may observe, per the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    // Validation
    NetworkMismatch,
    UnsupportedNetwork,
    SchemeMismatch,
    UnsupportedToken,
    ReceiverMismatch,
    InvalidSignature,
    InvalidTiming,
    AuthorizationNotYetValid,
    AuthorizationExpired,
    InsufficientValue,
    InsufficientFunds,
    InvalidAddress,
    InvalidCommitment,
    RouterNotAllowed,
    HookNotAllowed,
    FeeBelowMin,
    FeeAboveMax,

    // Settlement
    TransactionFailed,
    InvalidTransactionState,
    TransactionTimeout,
    NonceError,
    GasEstimationError,
    RpcError,
    ContractCallError,

    // Decoding
    DecodingError,

    // Backpressure
    QueueOverload,
    DuplicatePayer,

    // Configuration / general
    MissingParameters,
    UnexpectedError,
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{}", json.trim_matches('"'))
    }
}

impl ErrorReason {
    /// HTTP status this error maps to when it is the top-level reason a
    /// request failed outright (as opposed to a `{success:false,
    /// errorReason}` body on an otherwise-200 settle response).
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorReason::QueueOverload => StatusCode::SERVICE_UNAVAILABLE,
            ErrorReason::DuplicatePayer => StatusCode::TOO_MANY_REQUESTS,
            ErrorReason::UnexpectedError
            | ErrorReason::RpcError
            | ErrorReason::ContractCallError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// `Retry-After` seconds for backpressure errors, per §5.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            ErrorReason::QueueOverload => Some(60),
            ErrorReason::DuplicatePayer => Some(10),
            _ => None,
        }
    }

    /// Whether a client may usefully retry the same signed intent unchanged
    /// (commitment-as-nonce makes retries idempotent on chain).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorReason::TransactionTimeout
                | ErrorReason::NonceError
                | ErrorReason::RpcError
                | ErrorReason::QueueOverload
                | ErrorReason::DuplicatePayer
        )
    }
}

/// Sanitized JSON error body returned for requests that fail outright
/// (as opposed to a `{success:false, errorReason}` settle response).
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorReason,
}

impl IntoResponse for ErrorReason {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(ErrorBody { error: self })).into_response();
        if let Some(seconds) = self.retry_after_seconds() {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_snake_case() {
        assert_eq!(ErrorReason::InvalidCommitment.to_string(), "invalid_commitment");
        assert_eq!(ErrorReason::QueueOverload.to_string(), "queue_overload");
    }

    #[test]
    fn backpressure_errors_carry_retry_after() {
        assert_eq!(ErrorReason::QueueOverload.retry_after_seconds(), Some(60));
        assert_eq!(ErrorReason::DuplicatePayer.retry_after_seconds(), Some(10));
        assert_eq!(ErrorReason::InvalidCommitment.retry_after_seconds(), None);
    }

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(ErrorReason::QueueOverload.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorReason::DuplicatePayer.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ErrorReason::InvalidSignature.status_code(), StatusCode::BAD_REQUEST);
    }
}
