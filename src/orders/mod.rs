//! Order/delivery business layer.
//!
//! `model.rs` holds payloads and their validation; `handlers.rs` wires them
//! to the resilient client (order role) and the storage sink (delivery
//! role).

pub mod handlers;
pub mod model;

pub use handlers::DELIVERY_PATH;
pub use model::{
    DeliveryRequest, DeliveryResponse, FieldError, InvalidPayload, Money, Order, OrderItem,
    OrderRequest, OrderResponse,
};
