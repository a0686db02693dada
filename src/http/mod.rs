//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, role routes)
//!     → middleware/ (correlation id + span, timed observation)
//!     → timeout and body-limit layers
//!     → request.rs (JSON body → payload or ApiError)
//!     → handlers (health/ready here, business in `orders`)
//!     → response.rs (errors as JSON with correlation id)
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::JsonPayload;
pub use response::ApiError;
pub use server::{AppState, HttpServer};
