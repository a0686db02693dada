//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → correlation.rs (assign or propagate X-Correlation-ID)
//!     → observer.rs (timer start ... one terminal record)
//!
//! All records:
//!     → telemetry.rs (TelemetrySink)
//!         → logging.rs (structured tracing events)
//!         → metrics.rs (counters, histograms, gauges)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Correlation ID flows through all subsystems via the request span
//! - Metrics are cheap (atomic increments)

pub mod correlation;
pub mod logging;
pub mod metrics;
pub mod observer;
pub mod telemetry;

pub use correlation::{assign_or_propagate, CorrelationId, X_CORRELATION_ID, X_REQUEST_ID};
pub use observer::{Clock, ObservationHandle, SystemClock, TimedObserver};
pub use telemetry::{
    LogSink, RecordingSink, RequestObservation, StatusCategory, TelemetryEvent, TelemetrySink,
};
