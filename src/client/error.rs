//! Typed outbound call errors.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

use crate::resilience::ErrorKind;

/// Final failure of an outbound call, one variant per [`ErrorKind`].
///
/// `attempts` is the number of attempts actually made (0 when the call never
/// reached the wire).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("call to '{peer}' timed out ({attempts} attempt(s))")]
    Timeout { peer: String, attempts: u32 },

    #[error("peer '{peer}' unreachable ({attempts} attempt(s)): {reason}")]
    ConnectionRefused {
        peer: String,
        reason: String,
        attempts: u32,
    },

    #[error("peer '{peer}' answered {status} ({attempts} attempt(s))")]
    PeerUnavailable {
        peer: String,
        status: u16,
        body: String,
        attempts: u32,
    },

    #[error("peer '{peer}' rejected the request with {status}")]
    ClientRejected {
        peer: String,
        status: u16,
        body: String,
        attempts: u32,
    },

    #[error("peer '{peer}' throttled the request with {status} ({attempts} attempt(s))")]
    Throttled {
        peer: String,
        status: u16,
        retry_after: Option<Duration>,
        attempts: u32,
    },

    #[error("validation failed for '{peer}': {details}")]
    Validation {
        peer: String,
        details: String,
        attempts: u32,
    },

    #[error("unexpected failure calling '{peer}' ({attempts} attempt(s)): {reason}")]
    Unknown {
        peer: String,
        reason: String,
        status: Option<u16>,
        attempts: u32,
    },
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::Timeout { .. } => ErrorKind::Timeout,
            CallError::ConnectionRefused { .. } => ErrorKind::ConnectionRefused,
            CallError::PeerUnavailable { .. } => ErrorKind::PeerUnavailable,
            CallError::ClientRejected { .. } => ErrorKind::ClientRejected,
            CallError::Throttled { .. } => ErrorKind::ThrottledOrTimeoutRetryable,
            CallError::Validation { .. } => ErrorKind::ValidationFailure,
            CallError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            CallError::Timeout { attempts, .. }
            | CallError::ConnectionRefused { attempts, .. }
            | CallError::PeerUnavailable { attempts, .. }
            | CallError::ClientRejected { attempts, .. }
            | CallError::Throttled { attempts, .. }
            | CallError::Validation { attempts, .. }
            | CallError::Unknown { attempts, .. } => *attempts,
        }
    }

    pub fn peer(&self) -> &str {
        match self {
            CallError::Timeout { peer, .. }
            | CallError::ConnectionRefused { peer, .. }
            | CallError::PeerUnavailable { peer, .. }
            | CallError::ClientRejected { peer, .. }
            | CallError::Throttled { peer, .. }
            | CallError::Validation { peer, .. }
            | CallError::Unknown { peer, .. } => peer,
        }
    }

    /// Status the peer answered with, when there was one.
    pub fn peer_status(&self) -> Option<u16> {
        match self {
            CallError::PeerUnavailable { status, .. }
            | CallError::ClientRejected { status, .. }
            | CallError::Throttled { status, .. } => Some(*status),
            CallError::Unknown { status, .. } => *status,
            _ => None,
        }
    }

    /// Status to surface to the original caller.
    ///
    /// Rejections keep the peer's own 4xx so the caller gets something
    /// actionable; everything else follows the kind.
    pub fn upstream_status(&self) -> StatusCode {
        if let CallError::ClientRejected { status, .. } = self {
            if let Ok(code) = StatusCode::from_u16(*status) {
                if code.is_client_error() {
                    return code;
                }
            }
        }
        self.kind().upstream_status()
    }
}
