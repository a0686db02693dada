//! Storage sink subsystem.
//!
//! # Data Flow
//! ```text
//! Validated delivery request:
//!     → DeliveryRecord
//!     → StorageSink::put
//!     → Ok | ThroughputExceeded | TransientFailure | Fatal
//! ```
//!
//! # Design Decisions
//! - The storage engine is external; the pipeline only sees this trait
//! - Store outcomes map into the same error taxonomy as outbound calls
//! - `memory.rs` is the in-process implementation

pub mod memory;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::orders::model::{DeliveryRequest, Money, OrderItem};
use crate::resilience::ErrorKind;

pub use memory::InMemoryStore;

/// Row written for one delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: String,
    pub order_id: String,
    pub customer_name: String,
    pub total_amount: Money,
    pub shipping_address: String,
    pub items: Vec<OrderItem>,
    pub correlation_id: String,
    pub created_at_ms: u64,
}

impl DeliveryRecord {
    pub fn new(request: DeliveryRequest, correlation_id: &str, created_at_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            order_id: request.order_id,
            customer_name: request.customer_name,
            total_amount: request.total_amount,
            shipping_address: request.shipping_address,
            items: request.items,
            correlation_id: correlation_id.to_string(),
            created_at_ms,
        }
    }
}

/// Why a write did not land.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("storage throughput exceeded: {0}")]
    ThroughputExceeded(String),

    #[error("storage temporarily unavailable: {0}")]
    TransientFailure(String),

    #[error("storage failure: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::ThroughputExceeded(_) => ErrorKind::ThrottledOrTimeoutRetryable,
            StoreError::TransientFailure(_) => ErrorKind::PeerUnavailable,
            StoreError::Fatal(_) => ErrorKind::Unknown,
        }
    }

    /// Status for the caller of the delivery endpoint. Transient failures are
    /// 503 here, not the 502 used for HTTP peers.
    pub fn status(&self) -> StatusCode {
        match self {
            StoreError::ThroughputExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            StoreError::TransientFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            StoreError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Destination for validated deliveries.
#[async_trait]
pub trait StorageSink: Send + Sync {
    async fn put(&self, record: DeliveryRecord) -> Result<(), StoreError>;

    async fn get(&self, order_id: &str) -> Option<DeliveryRecord>;

    /// Whether writes are currently accepted.
    fn is_healthy(&self) -> bool;

    /// Stop accepting writes and release resources.
    async fn close(&self);
}
