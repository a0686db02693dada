//! Correlation identifiers.
//!
//! # Responsibilities
//! - Reuse the caller's correlation id when one is supplied
//! - Mint a fresh id otherwise
//! - Expose the header names used inbound, outbound and on responses
//!
//! # Design Decisions
//! - Lookup follows an ordered list of header names; first usable value wins
//! - Supplied ids are never validated or rewritten, only required to be
//!   non-empty header text
//! - Assignment never fails; anything unusable falls back to a new UUID v4

use std::fmt;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

/// Primary correlation header, also written on every response and outbound call.
pub const X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

/// Fallback header accepted on inbound requests.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Inbound lookup order.
pub const INBOUND_HEADERS: [HeaderName; 2] = [X_CORRELATION_ID, X_REQUEST_ID];

/// Opaque per-request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Mint a new random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Header value form; ids only ever come from header text or UUIDs.
    pub fn header_value(&self) -> HeaderValue {
        HeaderValue::from_str(&self.0).unwrap_or_else(|_| HeaderValue::from_static("invalid"))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Read the first usable correlation value from `headers`, if any.
pub fn inbound_correlation_id(headers: &HeaderMap) -> Option<CorrelationId> {
    INBOUND_HEADERS.iter().find_map(|name| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.trim().is_empty())
            .map(|value| CorrelationId(value.to_string()))
    })
}

/// Reuse the inbound correlation id or mint a new one.
pub fn assign_or_propagate(headers: &HeaderMap) -> CorrelationId {
    inbound_correlation_id(headers).unwrap_or_else(CorrelationId::generate)
}
