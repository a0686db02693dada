//! Error responses.
//!
//! # Responsibilities
//! - Map call, storage and validation failures to HTTP statuses
//! - Render every error as `{error, code, message, correlation_id}`
//! - Echo the correlation id in the `X-Correlation-ID` header
//!
//! # Design Decisions
//! - `code` is the stable taxonomy code; `error` is the status reason phrase
//! - Peer bodies are logged, never forwarded to the caller

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::client::CallError;
use crate::observability::{CorrelationId, X_CORRELATION_ID};
use crate::orders::model::{FieldError, InvalidPayload};
use crate::resilience::ErrorKind;
use crate::storage::StoreError;

/// An error on its way to the caller.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub correlation_id: Option<CorrelationId>,
    pub details: Option<Vec<FieldError>>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: &'a str,
    message: &'a str,
    correlation_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a [FieldError]>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            correlation_id: None,
            details: None,
        }
    }

    /// Malformed request body.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorKind::ValidationFailure.code(),
            message,
        )
    }

    /// Request body that parsed but broke field rules.
    pub fn invalid_payload(invalid: InvalidPayload) -> Self {
        let mut error = Self::validation(invalid.to_string());
        error.details = Some(invalid.0);
        error
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn from_call(error: &CallError) -> Self {
        let kind = error.kind();
        let message = match error {
            CallError::ClientRejected { peer, status, .. } => {
                format!("peer '{}' rejected the request with {}", peer, status)
            }
            CallError::Throttled { peer, .. } => format!("peer '{}' is throttling requests", peer),
            CallError::Timeout { peer, attempts } => {
                format!("peer '{}' did not answer after {} attempt(s)", peer, attempts)
            }
            CallError::ConnectionRefused { peer, attempts, .. } => {
                format!("peer '{}' is unreachable after {} attempt(s)", peer, attempts)
            }
            CallError::PeerUnavailable { peer, attempts, .. } => {
                format!("peer '{}' is unavailable after {} attempt(s)", peer, attempts)
            }
            CallError::Validation { details, .. } => details.clone(),
            CallError::Unknown { .. } => "unexpected failure calling a downstream service".to_string(),
        };
        Self::new(error.upstream_status(), kind.code(), message)
    }

    pub fn from_store(error: &StoreError) -> Self {
        let message = match error {
            StoreError::ThroughputExceeded(_) => "storage is busy, retry later",
            StoreError::TransientFailure(_) => "storage is temporarily unavailable",
            StoreError::Fatal(_) => "storage rejected the write",
        };
        Self::new(error.status(), error.kind().code(), message)
    }

    pub fn correlated(mut self, correlation_id: &CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id.clone());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let correlation_id = self.correlation_id.as_ref().map_or("", CorrelationId::as_str);
        let body = ErrorBody {
            error: self.status.canonical_reason().unwrap_or("Error"),
            code: self.code,
            message: &self.message,
            correlation_id,
            details: self.details.as_deref(),
        };

        let mut response = (self.status, Json(body)).into_response();
        if let Some(id) = &self.correlation_id {
            response.headers_mut().insert(X_CORRELATION_ID, id.header_value());
        }
        response
    }
}
