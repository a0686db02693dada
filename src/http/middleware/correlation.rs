//! Correlation middleware.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

use crate::observability::{assign_or_propagate, X_CORRELATION_ID};

/// Assign or propagate the correlation id, attach it to the request and
/// echo it on the response.
///
/// Everything downstream runs inside a `request` span carrying the id.
pub async fn correlate(mut request: Request, next: Next) -> Response {
    let correlation_id = assign_or_propagate(request.headers());
    request.extensions_mut().insert(correlation_id.clone());

    let span = tracing::info_span!(
        "request",
        correlation_id = %correlation_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;
    response
        .headers_mut()
        .insert(X_CORRELATION_ID, correlation_id.header_value());
    response
}
