//! Request relay: correlated, observed, resilient service-to-service calls.

pub mod client;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod orders;
pub mod resilience;
pub mod security;
pub mod storage;

pub use client::ResilientClient;
pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::{Lifecycle, Relay};
