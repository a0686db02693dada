//! Order and delivery endpoints.
//!
//! # Data Flow
//! ```text
//! POST /api/orders (order role):
//!     → validate OrderRequest
//!     → DeliveryRequest → ResilientClient → `delivery` peer
//!     → OrderResponse | ApiError (taxonomy status)
//!
//! POST /api/delivery (delivery role):
//!     → validate DeliveryRequest
//!     → DeliveryRecord → StorageSink::put
//!     → DeliveryResponse | ApiError (store status)
//!
//! GET /api/delivery/config (delivery role):
//!     → non-sensitive runtime settings
//! ```

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;

use crate::client::CallOptions;
use crate::config::{ServiceRole, StorageConfig, DELIVERY_PEER};
use crate::http::request::JsonPayload;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::CorrelationId;
use crate::orders::model::{
    unix_millis, DeliveryRequest, DeliveryResponse, OrderRequest, OrderResponse,
};
use crate::resilience::ErrorKind;
use crate::storage::DeliveryRecord;

/// Path of the delivery endpoint on the delivery peer.
pub const DELIVERY_PATH: &str = "/api/delivery";

pub async fn create_order(
    State(state): State<AppState>,
    Extension(correlation_id): Extension<CorrelationId>,
    JsonPayload(request): JsonPayload<OrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = request
        .validate()
        .map_err(|invalid| ApiError::invalid_payload(invalid).correlated(&correlation_id))?;

    tracing::info!(
        order_id = %order.order_id,
        item_count = order.items.len(),
        total_amount = %order.total_amount,
        "Processing order"
    );

    let delivery = DeliveryRequest::from(&order);
    let response = state
        .client
        .call_detached(
            DELIVERY_PEER,
            DELIVERY_PATH,
            delivery,
            &correlation_id,
            CallOptions::default(),
        )
        .await
        .map_err(|e| {
            tracing::warn!(
                order_id = %order.order_id,
                error_kind = e.kind().code(),
                attempts = e.attempts(),
                "Delivery call failed"
            );
            ApiError::from_call(&e).correlated(&correlation_id)
        })?;

    let ack: DeliveryResponse = response.json().map_err(|e| {
        tracing::error!(order_id = %order.order_id, error = %e, "Unreadable delivery acknowledgement");
        ApiError::new(
            StatusCode::BAD_GATEWAY,
            ErrorKind::ValidationFailure.code(),
            "delivery service returned an unreadable acknowledgement",
        )
        .correlated(&correlation_id)
    })?;

    if !ack.success {
        tracing::error!(order_id = %order.order_id, message = %ack.message, "Delivery reported failure");
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Unknown.code(),
            format!("order processing failed: {}", ack.message),
        )
        .correlated(&correlation_id));
    }

    tracing::info!(
        order_id = %order.order_id,
        attempts = response.attempts.len(),
        "Order processed"
    );

    Ok(Json(OrderResponse {
        item_count: order.items.len(),
        order_id: order.order_id,
        status: "processed".to_string(),
        message: "Order processed successfully".to_string(),
        customer_name: order.customer_name,
        total_amount: order.total_amount,
        correlation_id: correlation_id.to_string(),
    }))
}

pub async fn deliver(
    State(state): State<AppState>,
    Extension(correlation_id): Extension<CorrelationId>,
    JsonPayload(request): JsonPayload<DeliveryRequest>,
) -> Result<Json<DeliveryResponse>, ApiError> {
    let request = request
        .validate()
        .map_err(|invalid| ApiError::invalid_payload(invalid).correlated(&correlation_id))?;

    let order_id = request.order_id.clone();
    let record = DeliveryRecord::new(request, correlation_id.as_str(), unix_millis());

    state.storage.put(record).await.map_err(|e| {
        tracing::warn!(order_id = %order_id, error = %e, "Delivery not stored");
        ApiError::from_store(&e).correlated(&correlation_id)
    })?;

    Ok(Json(DeliveryResponse::stored(order_id)))
}

pub async fn get_delivery(
    State(state): State<AppState>,
    Extension(correlation_id): Extension<CorrelationId>,
    Path(order_id): Path<String>,
) -> Result<Json<DeliveryRecord>, ApiError> {
    state.storage.get(&order_id).await.map(Json).ok_or_else(|| {
        ApiError::not_found(format!("no delivery for order '{}'", order_id))
            .correlated(&correlation_id)
    })
}

/// Runtime settings safe to expose. Peer URLs and addresses stay out.
#[derive(Debug, Serialize)]
pub struct RuntimeConfigView {
    pub service: String,
    pub version: String,
    pub role: ServiceRole,
    pub storage: StorageConfig,
    pub max_body_bytes: usize,
    pub request_timeout_secs: u64,
    pub timestamp_ms: u64,
}

pub async fn delivery_config(State(state): State<AppState>) -> Json<RuntimeConfigView> {
    let config = &state.config;
    Json(RuntimeConfigView {
        service: config.service.name.clone(),
        version: config.service.version.clone(),
        role: config.service.role,
        storage: config.storage.clone(),
        max_body_bytes: config.listener.max_body_bytes,
        request_timeout_secs: config.listener.request_timeout_secs,
        timestamp_ms: unix_millis(),
    })
}
