//! Error body normalization.
//!
//! Layers below the handlers (body limit, timeout, panic catching) and the
//! router itself answer errors with plain text or empty bodies. This
//! middleware rewrites any such 4xx/5xx into the JSON error body, keeping
//! headers like `Allow`.

use std::any::Any;

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::response::ApiError;
use crate::observability::CorrelationId;
use crate::resilience::ErrorKind;

/// Rewrite non-JSON error responses as [`ApiError`]s.
pub async fn render_errors(request: Request, next: Next) -> Response {
    let correlation_id = request.extensions().get::<CorrelationId>().cloned();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_json(&response) {
        return response;
    }

    let (code, message) = match status {
        StatusCode::NOT_FOUND => ("not_found", format!("no route for {} {}", method, path)),
        StatusCode::METHOD_NOT_ALLOWED => (
            "method_not_allowed",
            format!("{} is not allowed on {}", method, path),
        ),
        StatusCode::PAYLOAD_TOO_LARGE => {
            ("payload_too_large", "request body is too large".to_string())
        }
        StatusCode::REQUEST_TIMEOUT => (
            ErrorKind::Timeout.code(),
            "request did not complete in time".to_string(),
        ),
        _ => (ErrorKind::Unknown.code(), "unexpected server error".to_string()),
    };

    let mut error = ApiError::new(status, code, message);
    if let Some(id) = &correlation_id {
        error = error.correlated(id);
    }

    let (parts, _) = response.into_parts();
    let mut rendered = error.into_response();
    for (name, value) in parts.headers.iter() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            rendered.headers_mut().entry(name).or_insert(value.clone());
        }
    }
    rendered
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

/// Panic hook for `CatchPanicLayer`; [`render_errors`] adds the body.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("<non-string panic>");
    tracing::error!(panic = detail, "Handler panicked");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// Fallback for unknown paths.
pub async fn not_found(request: Request) -> ApiError {
    let error = ApiError::not_found(format!(
        "no route for {} {}",
        request.method(),
        request.uri().path()
    ));
    match request.extensions().get::<CorrelationId>() {
        Some(id) => error.correlated(id),
        None => error,
    }
}
