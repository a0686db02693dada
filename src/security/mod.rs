//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Any code path that logs request or response headers:
//!     → headers.rs (replace denylisted values with a marker)
//!     → log line
//! ```
//!
//! # Design Decisions
//! - Fail closed: headers are only logged through the redacting view
//! - No trust in client input: supplied values are never echoed raw when sensitive

pub mod headers;

pub use headers::{redact_headers, RedactedHeaders, REDACTED};
