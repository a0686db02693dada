//! Order and delivery payloads.
//!
//! # Responsibilities
//! - Deserialize inbound order and delivery payloads
//! - Validate them field by field, reporting every problem at once
//! - Build the delivery request the order side forwards
//!
//! # Design Decisions
//! - Money is held as integer cents; more than two decimals is rejected
//! - Strings are trimmed before any length check
//! - Lengths count characters, not bytes

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

/// Largest total a delivery record may carry.
pub const MAX_TOTAL_CENTS: i64 = 9_999_999_999;

/// Amount of money in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Money(i64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("'{0}' is not a decimal amount")]
    Invalid(String),

    #[error("'{0}' has more than 2 decimal places")]
    TooPrecise(String),

    #[error("'{0}' is out of range")]
    OutOfRange(String),
}

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    /// Parse `12`, `12.5` or `12.50`.
    pub fn parse(text: &str) -> Result<Self, MoneyError> {
        let trimmed = text.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

        let numeric = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !numeric(whole) || !numeric(fraction) {
            return Err(MoneyError::Invalid(text.to_string()));
        }
        let fraction = fraction.trim_end_matches('0');
        if fraction.len() > 2 {
            return Err(MoneyError::TooPrecise(text.to_string()));
        }

        let out_of_range = || MoneyError::OutOfRange(text.to_string());
        let whole: i64 = whole.parse().map_err(|_| out_of_range())?;
        let fraction_cents: i64 = format!("{:0<2}", fraction).parse().map_err(|_| out_of_range())?;
        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction_cents))
            .ok_or_else(out_of_range)?;

        Ok(Money(if negative { -cents } else { cents }))
    }

    pub fn checked_mul(self, factor: i64) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0 as f64 / 100.0)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MoneyVisitor;

        impl Visitor<'_> for MoneyVisitor {
            type Value = Money;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal amount with at most 2 decimal places")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
                v.checked_mul(100)
                    .map(Money)
                    .ok_or_else(|| E::custom(MoneyError::OutOfRange(v.to_string())))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
                i64::try_from(v)
                    .ok()
                    .and_then(|v| v.checked_mul(100))
                    .map(Money)
                    .ok_or_else(|| E::custom(MoneyError::OutOfRange(v.to_string())))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
                // Display for f64 is the shortest text that round-trips,
                // so 29.99 stays "29.99".
                Money::parse(&v.to_string()).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
                Money::parse(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(MoneyVisitor)
    }
}

/// One problem with one field.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every problem found in one payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", summarize(.0))]
pub struct InvalidPayload(pub Vec<FieldError>);

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn check_len(errors: &mut Vec<FieldError>, field: &str, value: &str, min: usize, max: usize) {
    let len = value.chars().count();
    if len < min || len > max {
        errors.push(FieldError::new(
            field,
            format!("must be {} to {} characters (got {})", min, max, len),
        ));
    }
}

/// `ORD-` followed by eight upper-case hex digits.
pub fn generate_order_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("ORD-{}", hex[..8].to_ascii_uppercase())
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: i64,
    pub price: Money,
}

impl OrderItem {
    fn line_total(&self) -> Option<Money> {
        self.price.checked_mul(self.quantity)
    }
}

/// Inbound order as received on `POST /api/orders`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderRequest {
    #[serde(default)]
    pub order_id: Option<String>,
    pub customer_name: String,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total_amount: Option<Money>,
    pub shipping_address: String,
}

/// An order that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub order_id: String,
    pub customer_name: String,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub shipping_address: String,
}

impl OrderRequest {
    pub fn validate(self) -> Result<Order, InvalidPayload> {
        let mut errors = Vec::new();

        let order_id = match self.order_id.as_deref().map(str::trim) {
            Some("") | None => generate_order_id(),
            Some(id) => id.to_string(),
        };

        let customer_name = self.customer_name.trim().to_string();
        check_len(&mut errors, "customer_name", &customer_name, 1, 200);
        if !customer_name
            .chars()
            .all(|c| c.is_alphabetic() || " -'.".contains(c))
        {
            errors.push(FieldError::new("customer_name", "contains invalid characters"));
        }

        if self.items.is_empty() || self.items.len() > 50 {
            errors.push(FieldError::new(
                "items",
                format!("must contain 1 to 50 items (got {})", self.items.len()),
            ));
        }

        let mut items = Vec::with_capacity(self.items.len());
        for (i, item) in self.items.into_iter().enumerate() {
            let field = |name: &str| format!("items[{}].{}", i, name);
            let product_id = item.product_id.trim().to_string();
            check_len(&mut errors, &field("product_id"), &product_id, 1, 100);
            if !product_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                errors.push(FieldError::new(
                    field("product_id"),
                    "may only contain letters, digits, '-' and '_'",
                ));
            }
            if !(1..=1000).contains(&item.quantity) {
                errors.push(FieldError::new(field("quantity"), "must be 1 to 1000"));
            }
            if item.price <= Money::ZERO {
                errors.push(FieldError::new(field("price"), "must be greater than 0"));
            }
            items.push(OrderItem { product_id, ..item });
        }

        let total_amount = match self.total_amount {
            Some(total) => Some(total),
            None => items
                .iter()
                .try_fold(Money::ZERO, |sum, item| sum.checked_add(item.line_total()?)),
        };
        let total_amount = match total_amount {
            Some(total) if total > Money::ZERO => total,
            Some(_) => {
                errors.push(FieldError::new("total_amount", "must be greater than 0"));
                Money::ZERO
            }
            None => {
                errors.push(FieldError::new("total_amount", "is out of range"));
                Money::ZERO
            }
        };

        let shipping_address = self.shipping_address.trim().to_string();
        check_len(&mut errors, "shipping_address", &shipping_address, 10, 500);

        if !errors.is_empty() {
            return Err(InvalidPayload(errors));
        }
        Ok(Order {
            order_id,
            customer_name,
            items,
            total_amount,
            shipping_address,
        })
    }
}

/// Payload the order side sends to the delivery peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub order_id: String,
    pub customer_name: String,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub shipping_address: String,
    /// Creation time, unix milliseconds.
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
}

impl From<&Order> for DeliveryRequest {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id.clone(),
            customer_name: order.customer_name.clone(),
            items: order.items.clone(),
            total_amount: order.total_amount,
            shipping_address: order.shipping_address.clone(),
            timestamp_ms: Some(unix_millis()),
        }
    }
}

impl DeliveryRequest {
    /// Delivery-side checks, looser than the order side's.
    pub fn validate(mut self) -> Result<Self, InvalidPayload> {
        let mut errors = Vec::new();

        self.order_id = self.order_id.trim().to_string();
        check_len(&mut errors, "order_id", &self.order_id, 1, 50);

        self.customer_name = self.customer_name.trim().to_string();
        check_len(&mut errors, "customer_name", &self.customer_name, 1, 255);

        if self.total_amount < Money::ZERO || self.total_amount.cents() > MAX_TOTAL_CENTS {
            errors.push(FieldError::new(
                "total_amount",
                format!("must be between 0 and {}", Money::from_cents(MAX_TOTAL_CENTS)),
            ));
        }

        self.shipping_address = self.shipping_address.trim().to_string();
        if self.shipping_address.is_empty() {
            errors.push(FieldError::new("shipping_address", "must not be empty"));
        }

        for (i, item) in self.items.iter().enumerate() {
            if item.product_id.trim().is_empty() {
                errors.push(FieldError::new(format!("items[{}].product_id", i), "is required"));
            }
            if item.quantity <= 0 {
                errors.push(FieldError::new(format!("items[{}].quantity", i), "must be positive"));
            }
            if item.price < Money::ZERO {
                errors.push(FieldError::new(format!("items[{}].price", i), "must not be negative"));
            }
        }

        if errors.is_empty() {
            Ok(self)
        } else {
            Err(InvalidPayload(errors))
        }
    }
}

/// Body returned by `POST /api/orders` on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub status: String,
    pub message: String,
    pub customer_name: String,
    pub total_amount: Money,
    pub item_count: usize,
    pub correlation_id: String,
}

/// Body returned by `POST /api/delivery` on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryResponse {
    pub success: bool,
    pub message: String,
    pub order_id: String,
    pub processed_at_ms: u64,
}

impl DeliveryResponse {
    pub fn stored(order_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message: "Order processed successfully".to_string(),
            order_id: order_id.into(),
            processed_at_ms: unix_millis(),
        }
    }
}
