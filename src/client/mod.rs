//! Outbound client subsystem.
//!
//! # Data Flow
//! ```text
//! Handler needs a peer:
//!     → resilient.rs (serialize, retry loop, per-attempt deadline)
//!         → pool.rs (wait for a slot on the peer's pool)
//!         → transport.rs (send over hyper, read the body)
//!     → On failure: error.rs (CallError carrying the ErrorKind)
//!
//! Readiness / startup:
//!     → resilient.rs health_check (single probe, own transport)
//!     → health.rs (HealthReport)
//! ```
//!
//! # Design Decisions
//! - One pool per peer, sized by `max_connections`
//! - Health probes never borrow from the request pools
//! - Closing the client drops every pooled connection

pub mod error;
pub mod health;
pub mod pool;
pub mod resilient;
pub mod transport;

pub use error::CallError;
pub use health::{HealthReport, HealthStatus};
pub use pool::{PeerPool, PoolError, PoolLease, PoolStats};
pub use resilient::{CallOptions, CallResponse, ClientBuildError, ClientTimeouts, ResilientClient};
pub use transport::{HyperTransport, PeerResponse, PoolSettings, Transport, TransportError};
