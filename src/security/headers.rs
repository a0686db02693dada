//! Header redaction for logs.
//!
//! # Responsibilities
//! - Replace sensitive header values before headers reach any log line
//! - Provide a `Debug`/`Display` view usable directly as a tracing field
//!
//! # Design Decisions
//! - Fixed denylist, matched case-insensitively (header names are lowercase)
//! - Redaction is a view over the original map; the map sent on the wire is
//!   never modified
//! - Non-text values are shown as a placeholder, never as raw bytes

use std::fmt;

use axum::http::HeaderMap;

/// Marker written in place of a sensitive value.
pub const REDACTED: &str = "[REDACTED]";

/// Header names whose values never appear in logs.
pub const SENSITIVE_HEADERS: [&str; 6] = [
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
];

/// Whether `name` is on the denylist.
pub fn is_sensitive(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|sensitive| sensitive.eq_ignore_ascii_case(name))
}

/// Name/value pairs with sensitive values replaced.
pub fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if is_sensitive(name.as_str()) {
                REDACTED.to_string()
            } else {
                value.to_str().unwrap_or("<binary>").to_string()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}

/// Log-safe view of a header map.
pub struct RedactedHeaders<'a>(pub &'a HeaderMap);

impl fmt::Debug for RedactedHeaders<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(redact_headers(self.0)).finish()
    }
}

impl fmt::Display for RedactedHeaders<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer s3cr3t"));
        headers.insert("cookie", HeaderValue::from_static("session=abc"));
        headers.insert("x-api-key", HeaderValue::from_static("k-123"));
        headers.insert("x-correlation-id", HeaderValue::from_static("abc-123"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers
    }

    #[test]
    fn sensitive_values_are_replaced() {
        let redacted = redact_headers(&headers());
        let get = |name: &str| {
            redacted
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("authorization"), Some(REDACTED));
        assert_eq!(get("cookie"), Some(REDACTED));
        assert_eq!(get("x-api-key"), Some(REDACTED));
        assert_eq!(get("x-correlation-id"), Some("abc-123"));
        assert_eq!(get("content-type"), Some("application/json"));
    }

    #[test]
    fn formatted_view_never_contains_secrets() {
        let text = format!("{}", RedactedHeaders(&headers()));
        assert!(!text.contains("s3cr3t"));
        assert!(!text.contains("session=abc"));
        assert!(!text.contains("k-123"));
        assert!(text.contains("abc-123"));
    }

    #[test]
    fn denylist_match_ignores_case() {
        assert!(is_sensitive("Authorization"));
        assert!(is_sensitive("SET-COOKIE"));
        assert!(!is_sensitive("accept"));
    }
}
