//! Timed request observation.
//!
//! # Responsibilities
//! - Start a timer when an inbound request enters
//! - Emit exactly one terminal [`RequestObservation`] per request
//! - Flag requests slower than the configured threshold
//!
//! # Design Decisions
//! - Two clocks: wall clock for timestamps, monotonic clock for duration
//! - Nothing is emitted at start
//! - A handle dropped without a response still emits, with `error` set

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::body::HttpBody;
use axum::http::{header, HeaderMap, Request, Response};

use crate::observability::correlation::{assign_or_propagate, CorrelationId};
use crate::observability::telemetry::{RequestObservation, StatusCategory, TelemetrySink};

/// Error recorded when a request future is dropped before producing a response.
pub const ABORTED_BEFORE_RESPONSE: &str = "connection closed before a response was produced";

/// Time sources used by the observer.
pub trait Clock: Send + Sync {
    /// Monotonic reading used for durations.
    fn monotonic(&self) -> Instant;

    /// Wall-clock reading in unix milliseconds, used for timestamps only.
    fn wall_ms(&self) -> u64;
}

/// The operating system clocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn monotonic(&self) -> Instant {
        Instant::now()
    }

    fn wall_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

struct ObserverInner {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn TelemetrySink>,
    slow_threshold_ms: u64,
}

/// Wraps inbound request/response pairs and emits one record per request.
#[derive(Clone)]
pub struct TimedObserver {
    inner: Arc<ObserverInner>,
}

impl TimedObserver {
    pub fn new(sink: Arc<dyn TelemetrySink>, slow_threshold_ms: u64) -> Self {
        Self::with_clock(sink, Arc::new(SystemClock), slow_threshold_ms)
    }

    pub fn with_clock(
        sink: Arc<dyn TelemetrySink>,
        clock: Arc<dyn Clock>,
        slow_threshold_ms: u64,
    ) -> Self {
        Self {
            inner: Arc::new(ObserverInner {
                clock,
                sink,
                slow_threshold_ms,
            }),
        }
    }

    /// Start observing `request`.
    ///
    /// Uses the `CorrelationId` already attached to the request extensions, or
    /// derives one from the headers if the request was not tagged.
    pub fn on_request_start<B: HttpBody>(&self, request: &Request<B>) -> ObservationHandle {
        let correlation_id = request
            .extensions()
            .get::<CorrelationId>()
            .cloned()
            .unwrap_or_else(|| assign_or_propagate(request.headers()));

        ObservationHandle {
            observer: Arc::clone(&self.inner),
            correlation_id: correlation_id.to_string(),
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            request_bytes: body_len(request.headers(), request.body()),
            started_at: self.inner.clock.monotonic(),
            start_timestamp_ms: self.inner.clock.wall_ms(),
            finished: false,
        }
    }

    /// Finish observing with the response that was sent.
    pub fn on_request_end<B: HttpBody>(&self, handle: ObservationHandle, response: &Response<B>) {
        let status = response.status().as_u16();
        let bytes = body_len(response.headers(), response.body());
        handle.finish(Some(status), bytes, None);
    }

    /// Finish observing a request that produced no response.
    pub fn on_request_error(&self, handle: ObservationHandle, error: impl Into<String>) {
        handle.finish(None, 0, Some(error.into()));
    }
}

/// In-flight observation for one request.
#[must_use = "dropping the handle records the request as aborted"]
pub struct ObservationHandle {
    observer: Arc<ObserverInner>,
    correlation_id: String,
    method: String,
    path: String,
    request_bytes: u64,
    started_at: Instant,
    start_timestamp_ms: u64,
    finished: bool,
}

impl ObservationHandle {
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    fn finish(mut self, status: Option<u16>, response_bytes: u64, error: Option<String>) {
        self.emit(status, response_bytes, error);
    }

    fn emit(&mut self, status: Option<u16>, response_bytes: u64, error: Option<String>) {
        if self.finished {
            return;
        }
        self.finished = true;

        let observer = &self.observer;
        let duration_ms = observer
            .clock
            .monotonic()
            .saturating_duration_since(self.started_at)
            .as_millis() as u64;

        let record = RequestObservation {
            correlation_id: std::mem::take(&mut self.correlation_id),
            method: std::mem::take(&mut self.method),
            path: std::mem::take(&mut self.path),
            start_timestamp_ms: self.start_timestamp_ms,
            end_timestamp_ms: observer.clock.wall_ms(),
            duration_ms,
            request_bytes: self.request_bytes,
            response_bytes,
            status_code: status,
            status_category: status.map(StatusCategory::from_status),
            error,
        };

        observer.sink.observation(&record);
        if record.duration_ms > observer.slow_threshold_ms {
            observer.sink.slow_request(&record, observer.slow_threshold_ms);
        }
    }
}

impl Drop for ObservationHandle {
    fn drop(&mut self) {
        if !self.finished {
            self.emit(None, 0, Some(ABORTED_BEFORE_RESPONSE.to_string()));
        }
    }
}

/// Body length from the exact size hint, else `Content-Length`, else 0.
fn body_len<B: HttpBody>(headers: &HeaderMap, body: &B) -> u64 {
    body.size_hint().exact().unwrap_or_else(|| {
        headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::correlation::X_CORRELATION_ID;
    use crate::observability::telemetry::RecordingSink;
    use axum::body::Body;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Clock whose monotonic and wall readings move independently.
    struct ManualClock {
        base: Instant,
        state: Mutex<(Duration, i64)>,
    }

    impl ManualClock {
        fn new(wall_ms: i64) -> Self {
            Self {
                base: Instant::now(),
                state: Mutex::new((Duration::ZERO, wall_ms)),
            }
        }

        fn advance(&self, by: Duration) {
            let mut state = self.state.lock().unwrap();
            state.0 += by;
            state.1 += by.as_millis() as i64;
        }

        fn jump_wall(&self, by_ms: i64) {
            self.state.lock().unwrap().1 += by_ms;
        }
    }

    impl Clock for ManualClock {
        fn monotonic(&self) -> Instant {
            self.base + self.state.lock().unwrap().0
        }

        fn wall_ms(&self) -> u64 {
            self.state.lock().unwrap().1.max(0) as u64
        }
    }

    fn request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/orders?debug=1")
            .header(X_CORRELATION_ID, "abc-123")
            .body(Body::from(body))
            .unwrap()
    }

    fn response(status: u16, body: &'static str) -> Response<Body> {
        Response::builder().status(status).body(Body::from(body)).unwrap()
    }

    #[test]
    fn emits_one_record_at_end_only() {
        let sink = RecordingSink::new();
        let observer = TimedObserver::new(Arc::new(sink.clone()), 5_000);

        let handle = observer.on_request_start(&request("{\"a\":1}"));
        assert!(sink.events().is_empty());

        observer.on_request_end(handle, &response(201, "created"));

        let records = sink.observations();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.correlation_id, "abc-123");
        assert_eq!(record.method, "POST");
        assert_eq!(record.path, "/api/orders");
        assert_eq!(record.request_bytes, 7);
        assert_eq!(record.response_bytes, 7);
        assert_eq!(record.status_code, Some(201));
        assert_eq!(record.status_category, Some(StatusCategory::Success));
        assert_eq!(record.error, None);
    }

    #[test]
    fn duration_ignores_wall_clock_jumps() {
        let sink = RecordingSink::new();
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let observer = TimedObserver::with_clock(Arc::new(sink.clone()), clock.clone(), 5_000);

        let handle = observer.on_request_start(&request(""));
        clock.advance(Duration::from_millis(120));
        clock.jump_wall(-3_600_000);
        observer.on_request_end(handle, &response(200, ""));

        let record = &sink.observations()[0];
        assert_eq!(record.duration_ms, 120);
        assert!(record.end_timestamp_ms < record.start_timestamp_ms);
    }

    #[test]
    fn dropped_handle_emits_terminal_error_record() {
        let sink = RecordingSink::new();
        let observer = TimedObserver::new(Arc::new(sink.clone()), 5_000);

        drop(observer.on_request_start(&request("x")));

        let records = sink.observations();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status_code, None);
        assert_eq!(records[0].status_category, None);
        assert_eq!(records[0].error.as_deref(), Some(ABORTED_BEFORE_RESPONSE));
    }

    #[test]
    fn explicit_error_is_recorded_once() {
        let sink = RecordingSink::new();
        let observer = TimedObserver::new(Arc::new(sink.clone()), 5_000);

        let handle = observer.on_request_start(&request(""));
        observer.on_request_error(handle, "reset by peer");

        let records = sink.observations();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error.as_deref(), Some("reset by peer"));
    }

    #[test]
    fn slow_requests_get_a_side_record() {
        let sink = RecordingSink::new();
        let clock = Arc::new(ManualClock::new(0));
        let observer = TimedObserver::with_clock(Arc::new(sink.clone()), clock.clone(), 5_000);

        let fast = observer.on_request_start(&request(""));
        clock.advance(Duration::from_millis(5_000));
        observer.on_request_end(fast, &response(200, ""));
        assert_eq!(sink.slow_requests(), 0);

        let slow = observer.on_request_start(&request(""));
        clock.advance(Duration::from_millis(5_001));
        observer.on_request_end(slow, &response(200, ""));
        assert_eq!(sink.slow_requests(), 1);
        assert_eq!(sink.observations().len(), 2);
    }

    #[test]
    fn untagged_request_gets_an_id_from_headers() {
        let sink = RecordingSink::new();
        let observer = TimedObserver::new(Arc::new(sink.clone()), 5_000);
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();

        let handle = observer.on_request_start(&req);
        assert!(!handle.correlation_id().is_empty());
        observer.on_request_end(handle, &response(204, ""));
    }
}
