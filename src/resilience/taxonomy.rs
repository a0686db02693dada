//! Failure classification.
//!
//! # Responsibilities
//! - Map every observed failure to exactly one [`ErrorKind`]
//! - Decide retry eligibility from the kind alone
//! - Map a kind to the status code surfaced to the original caller
//!
//! # Design Decisions
//! - Transport failures are classified before any status is looked at
//! - Unrecognized statuses fall to `Unknown`, which is never retried
//! - The table is read-only; classification needs no synchronization

use std::fmt;

use axum::http::StatusCode;
use serde::Serialize;

/// Closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The attempt (or pool acquisition) exceeded its deadline.
    Timeout,
    /// The peer could not be reached or dropped the connection before responding.
    ConnectionRefused,
    /// The peer answered 5xx.
    PeerUnavailable,
    /// The peer rejected the request as malformed (4xx other than 408/429).
    ClientRejected,
    /// The peer asked us to slow down (429) or timed out reading our request (408).
    ThrottledOrTimeoutRetryable,
    /// Our payload or the peer's response failed validation.
    ValidationFailure,
    /// Anything the table does not recognize.
    Unknown,
}

impl ErrorKind {
    /// Whether a failure of this kind may be retried.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::ConnectionRefused
                | ErrorKind::PeerUnavailable
                | ErrorKind::ThrottledOrTimeoutRetryable
        )
    }

    /// Stable machine-readable code used in logs and error bodies.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::ConnectionRefused => "connection_refused",
            ErrorKind::PeerUnavailable => "peer_unavailable",
            ErrorKind::ClientRejected => "client_rejected",
            ErrorKind::ThrottledOrTimeoutRetryable => "throttled",
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Status returned upstream when a failure of this kind ends a request.
    ///
    /// `ClientRejected` normally surfaces the peer's own status instead; 400 is
    /// only the fallback when that status is not a 4xx.
    pub fn upstream_status(self) -> StatusCode {
        match self {
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::ConnectionRefused => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::PeerUnavailable => StatusCode::BAD_GATEWAY,
            ErrorKind::ClientRejected => StatusCode::BAD_REQUEST,
            ErrorKind::ThrottledOrTimeoutRetryable => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::ValidationFailure => StatusCode::BAD_REQUEST,
            ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// What went wrong on one attempt, before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// A transport deadline elapsed.
    TransportTimeout,
    /// The connection could not be established.
    ConnectFailed,
    /// The connection was lost before a complete response arrived.
    NoResponse,
    /// The peer answered with this status code.
    Status(u16),
    /// A payload or response body failed validation.
    Invalid,
}

/// Classify a failure. Total over every input.
pub fn classify(failure: Failure) -> ErrorKind {
    match failure {
        Failure::TransportTimeout => ErrorKind::Timeout,
        Failure::ConnectFailed | Failure::NoResponse => ErrorKind::ConnectionRefused,
        Failure::Invalid => ErrorKind::ValidationFailure,
        Failure::Status(status) => classify_status(status),
    }
}

/// Classify a raw HTTP status code.
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        408 | 429 => ErrorKind::ThrottledOrTimeoutRetryable,
        400..=499 => ErrorKind::ClientRejected,
        500..=599 => ErrorKind::PeerUnavailable,
        _ => ErrorKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_total_over_reference_inputs() {
        let cases = [
            (Failure::TransportTimeout, ErrorKind::Timeout),
            (Failure::ConnectFailed, ErrorKind::ConnectionRefused),
            (Failure::Status(200), ErrorKind::Unknown),
            (Failure::Status(400), ErrorKind::ClientRejected),
            (Failure::Status(404), ErrorKind::ClientRejected),
            (Failure::Status(408), ErrorKind::ThrottledOrTimeoutRetryable),
            (Failure::Status(429), ErrorKind::ThrottledOrTimeoutRetryable),
            (Failure::Status(500), ErrorKind::PeerUnavailable),
            (Failure::Status(503), ErrorKind::PeerUnavailable),
            (Failure::Status(999), ErrorKind::Unknown),
        ];

        for (failure, expected) in cases {
            assert_eq!(classify(failure), expected, "{:?}", failure);
        }
    }

    #[test]
    fn every_status_maps_to_some_kind() {
        for status in 0..=u16::MAX {
            let _ = classify_status(status);
        }
    }

    #[test]
    fn dropped_connection_counts_as_refused() {
        assert_eq!(classify(Failure::NoResponse), ErrorKind::ConnectionRefused);
    }

    #[test]
    fn retry_set() {
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::ConnectionRefused.is_retryable());
        assert!(ErrorKind::PeerUnavailable.is_retryable());
        assert!(ErrorKind::ThrottledOrTimeoutRetryable.is_retryable());
        assert!(!ErrorKind::ClientRejected.is_retryable());
        assert!(!ErrorKind::ValidationFailure.is_retryable());
        assert!(!ErrorKind::Unknown.is_retryable());
    }

    #[test]
    fn throttling_surfaces_as_429() {
        assert_eq!(
            ErrorKind::ThrottledOrTimeoutRetryable.upstream_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ErrorKind::Unknown.upstream_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
