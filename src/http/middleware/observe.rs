//! Observation middleware.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::observability::TimedObserver;

/// Time the request and emit its terminal record once a response exists.
///
/// If this future is dropped first, the observation handle records the
/// request as aborted.
pub async fn observe(
    State(observer): State<TimedObserver>,
    request: Request,
    next: Next,
) -> Response {
    let handle = observer.on_request_start(&request);
    let response = next.run(request).await;
    observer.on_request_end(handle, &response);
    response
}
