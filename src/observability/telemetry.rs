//! Telemetry records and where they go.
//!
//! Every structured record the pipeline produces passes through a
//! [`TelemetrySink`]: one [`RequestObservation`] per inbound request, one
//! [`RetryAttempt`] per outbound attempt, and a slow-request flag when an
//! observation crosses the threshold. [`LogSink`] turns them into `tracing`
//! events and metrics; [`RecordingSink`] keeps them in memory.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::observability::metrics;
use crate::resilience::{AttemptOutcome, RetryAttempt};

/// Target used for telemetry events so collectors can route them separately.
pub const TELEMETRY_TARGET: &str = "request_relay::telemetry";

/// Status family of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Informational,
    Success,
    Redirect,
    ClientError,
    ServerError,
}

impl StatusCategory {
    /// Category of a status code; anything outside 1xx-4xx is a server error.
    pub fn from_status(status: u16) -> Self {
        match status {
            100..=199 => StatusCategory::Informational,
            200..=299 => StatusCategory::Success,
            300..=399 => StatusCategory::Redirect,
            400..=499 => StatusCategory::ClientError,
            _ => StatusCategory::ServerError,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusCategory::Informational => "informational",
            StatusCategory::Success => "success",
            StatusCategory::Redirect => "redirect",
            StatusCategory::ClientError => "client_error",
            StatusCategory::ServerError => "server_error",
        }
    }
}

/// Final record for one inbound request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestObservation {
    pub correlation_id: String,
    pub method: String,
    pub path: String,
    /// Wall-clock start, unix milliseconds.
    pub start_timestamp_ms: u64,
    /// Wall-clock end, unix milliseconds.
    pub end_timestamp_ms: u64,
    /// Monotonic duration.
    pub duration_ms: u64,
    pub request_bytes: u64,
    pub response_bytes: u64,
    pub status_code: Option<u16>,
    pub status_category: Option<StatusCategory>,
    /// Set when no response was produced.
    pub error: Option<String>,
}

/// Destination for telemetry records.
pub trait TelemetrySink: Send + Sync {
    /// Terminal record of an inbound request.
    fn observation(&self, record: &RequestObservation);

    /// Side record for an observation that exceeded the slow threshold.
    fn slow_request(&self, record: &RequestObservation, threshold_ms: u64);

    /// One attempt of one outbound call.
    fn attempt(&self, peer: &str, correlation_id: &str, attempt: &RetryAttempt);
}

/// Production sink: structured `tracing` events plus Prometheus metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn observation(&self, record: &RequestObservation) {
        let status_code = record.status_code.unwrap_or_default();
        let status_category = record.status_category.map(StatusCategory::as_str);

        match &record.error {
            None => tracing::info!(
                target: TELEMETRY_TARGET,
                correlation_id = %record.correlation_id,
                method = %record.method,
                path = %record.path,
                status_code,
                status_category,
                duration_ms = record.duration_ms,
                request_bytes = record.request_bytes,
                response_bytes = record.response_bytes,
                start_timestamp_ms = record.start_timestamp_ms,
                end_timestamp_ms = record.end_timestamp_ms,
                "Request completed"
            ),
            Some(error) => tracing::error!(
                target: TELEMETRY_TARGET,
                correlation_id = %record.correlation_id,
                method = %record.method,
                path = %record.path,
                error = %error,
                duration_ms = record.duration_ms,
                request_bytes = record.request_bytes,
                start_timestamp_ms = record.start_timestamp_ms,
                end_timestamp_ms = record.end_timestamp_ms,
                "Request ended without a response"
            ),
        }

        metrics::record_request(&record.method, record.status_code, record.duration_ms);
    }

    fn slow_request(&self, record: &RequestObservation, threshold_ms: u64) {
        tracing::warn!(
            target: TELEMETRY_TARGET,
            correlation_id = %record.correlation_id,
            method = %record.method,
            path = %record.path,
            duration_ms = record.duration_ms,
            threshold_ms,
            "Slow request"
        );
        metrics::record_slow_request(&record.method);
    }

    fn attempt(&self, peer: &str, correlation_id: &str, attempt: &RetryAttempt) {
        let error_kind = attempt.error_kind.map(|k| k.code());
        match attempt.outcome {
            AttemptOutcome::Success => tracing::info!(
                target: TELEMETRY_TARGET,
                peer,
                correlation_id,
                attempt = attempt.attempt_index,
                delay_before_attempt_ms = attempt.delay_before_attempt_ms,
                outcome = attempt.outcome.as_str(),
                elapsed_ms = attempt.elapsed_ms,
                "Outbound attempt"
            ),
            AttemptOutcome::RetryableFailure | AttemptOutcome::TerminalFailure => tracing::warn!(
                target: TELEMETRY_TARGET,
                peer,
                correlation_id,
                attempt = attempt.attempt_index,
                delay_before_attempt_ms = attempt.delay_before_attempt_ms,
                outcome = attempt.outcome.as_str(),
                error_kind,
                elapsed_ms = attempt.elapsed_ms,
                "Outbound attempt"
            ),
        }
        metrics::record_attempt(peer, attempt.outcome.as_str(), error_kind.unwrap_or("none"));
    }
}

/// Event captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    Observation(RequestObservation),
    SlowRequest { correlation_id: String, duration_ms: u64 },
    Attempt { peer: String, correlation_id: String, attempt: RetryAttempt },
}

/// In-memory sink that keeps every record in emission order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events so far.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.lock().clone()
    }

    pub fn observations(&self) -> Vec<RequestObservation> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TelemetryEvent::Observation(o) => Some(o),
                _ => None,
            })
            .collect()
    }

    pub fn attempts(&self) -> Vec<RetryAttempt> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TelemetryEvent::Attempt { attempt, .. } => Some(attempt),
                _ => None,
            })
            .collect()
    }

    pub fn slow_requests(&self) -> usize {
        self.lock()
            .iter()
            .filter(|e| matches!(e, TelemetryEvent::SlowRequest { .. }))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TelemetryEvent>> {
        // A panic while holding the lock leaves a still-usable Vec.
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TelemetrySink for RecordingSink {
    fn observation(&self, record: &RequestObservation) {
        self.lock().push(TelemetryEvent::Observation(record.clone()));
    }

    fn slow_request(&self, record: &RequestObservation, _threshold_ms: u64) {
        self.lock().push(TelemetryEvent::SlowRequest {
            correlation_id: record.correlation_id.clone(),
            duration_ms: record.duration_ms,
        });
    }

    fn attempt(&self, peer: &str, correlation_id: &str, attempt: &RetryAttempt) {
        self.lock().push(TelemetryEvent::Attempt {
            peer: peer.to_string(),
            correlation_id: correlation_id.to_string(),
            attempt: attempt.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_category_is_a_pure_function_of_status() {
        assert_eq!(StatusCategory::from_status(101), StatusCategory::Informational);
        assert_eq!(StatusCategory::from_status(204), StatusCategory::Success);
        assert_eq!(StatusCategory::from_status(302), StatusCategory::Redirect);
        assert_eq!(StatusCategory::from_status(404), StatusCategory::ClientError);
        assert_eq!(StatusCategory::from_status(503), StatusCategory::ServerError);
        assert_eq!(StatusCategory::from_status(999), StatusCategory::ServerError);
        assert_eq!(StatusCategory::from_status(42), StatusCategory::ServerError);
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        for i in 0..3 {
            sink.attempt(
                "delivery",
                "c-1",
                &RetryAttempt {
                    attempt_index: i,
                    delay_before_attempt_ms: 0,
                    outcome: AttemptOutcome::RetryableFailure,
                    error_kind: None,
                    elapsed_ms: 1,
                },
            );
        }
        let indices: Vec<_> = sink.attempts().iter().map(|a| a.attempt_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
