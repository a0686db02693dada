//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Storage → Client → Probe required peers → Bind → Ready
//!
//! Shutdown (shutdown.rs):
//!     Draining → Stop accepting → Drain in-flight (bounded) → Release client
//!     pools → Close storage → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Lifecycle::request_shutdown
//! ```
//!
//! # Design Decisions
//! - One state machine (state.rs) is the only source of truth
//! - Ordered startup, reverse-ordered release
//! - Drain has a hard deadline; missing it ends in Failed

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use shutdown::{drain, DrainOutcome};
pub use signals::spawn_signal_listener;
pub use startup::{Relay, ShutdownError, StartupError};
pub use state::{Lifecycle, LifecycleState, ShutdownRequest, TransitionError};
