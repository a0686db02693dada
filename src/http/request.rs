//! Request body extraction.
//!
//! # Responsibilities
//! - Buffer the body (the body-limit layer caps its size)
//! - Decode JSON into the handler's payload type
//! - Turn every rejection into a correlated [`ApiError`]
//!
//! # Design Decisions
//! - Content-Type is not enforced; the body either parses or it does not
//! - Decode errors carry serde's position information in the message

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use serde::de::DeserializeOwned;

use crate::http::response::ApiError;
use crate::observability::CorrelationId;

/// JSON body whose rejections render as [`ApiError`].
#[derive(Debug, Clone)]
pub struct JsonPayload<T>(pub T);

impl<S, T> FromRequest<S> for JsonPayload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = request
            .extensions()
            .get::<CorrelationId>()
            .cloned()
            .unwrap_or_else(CorrelationId::generate);

        let bytes = Bytes::from_request(request, state).await.map_err(|rejection| {
            let error = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::new(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "payload_too_large",
                    "request body is too large",
                )
            } else {
                ApiError::validation(rejection.body_text())
            };
            error.correlated(&correlation_id)
        })?;

        serde_json::from_slice(&bytes).map(JsonPayload).map_err(|e| {
            tracing::debug!(error = %e, "Rejected malformed JSON body");
            ApiError::validation(format!("invalid JSON body: {}", e)).correlated(&correlation_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Ping {
        count: u32,
    }

    fn request(body: &'static str) -> Request {
        let mut request = Request::new(Body::from(body));
        request.extensions_mut().insert(CorrelationId::from("abc-123"));
        request
    }

    #[tokio::test]
    async fn decodes_json() {
        let JsonPayload(ping) = JsonPayload::<Ping>::from_request(request(r#"{"count": 3}"#), &())
            .await
            .unwrap();
        assert_eq!(ping.count, 3);
    }

    #[tokio::test]
    async fn malformed_json_is_a_correlated_validation_error() {
        let error = JsonPayload::<Ping>::from_request(request("{\"count\":"), &())
            .await
            .unwrap_err();

        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.code, "validation_failure");
        assert_eq!(error.correlation_id.unwrap().as_str(), "abc-123");
    }

    #[tokio::test]
    async fn wrong_shape_is_rejected() {
        let error = JsonPayload::<Ping>::from_request(request(r#"{"count": "three"}"#), &())
            .await
            .unwrap_err();
        assert!(error.message.starts_with("invalid JSON body"));
    }
}
