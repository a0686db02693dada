//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound attempt:
//!     → timeouts.rs (per-attempt deadline)
//!     → On failure: taxonomy.rs (classify into ErrorKind)
//!     → retries.rs (retry eligibility, attempt record)
//!     → backoff.rs (delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retry eligibility depends on the classified kind only
//! - Jittered backoff prevents synchronized retry storms

pub mod backoff;
pub mod retries;
pub mod taxonomy;
pub mod timeouts;

pub use retries::{AttemptOutcome, RetryAttempt, RetryPolicy, Sleeper, TokioSleeper};
pub use taxonomy::{classify, classify_status, ErrorKind, Failure};
