//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    LifecycleConfig, ListenerConfig, LogFormat, ObservabilityConfig, PeerConfig, RelayConfig,
    RetryConfig, ServiceConfig, ServiceRole, StorageConfig, TimeoutConfig,
};
pub use validation::{ValidationError, DELIVERY_PEER};
