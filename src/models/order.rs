//! Order data models and API request/response types.
//!
//! This module defines:
//! - `OrderStatus`: closed set of order states
//! - `Order` / `OrderLine`: the stored order and its immutable line snapshot
//! - `NewOrderLine`: snapshot row copied from a cart line at checkout
//! - Request and response bodies for checkout and confirmation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::gateway::IntentStatus;
use crate::models::cart::CartDetails;
use crate::models::product::Product;

/// Order state.
///
/// `Pending` may be revisited by repeated checkouts; `Completed` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Completed => "COMPLETED",
        }
    }
}

/// A stored status value outside the known set.
#[derive(Debug, Error)]
#[error("unknown order status: {0}")]
pub struct UnknownOrderStatus(pub String);

impl TryFrom<String> for OrderStatus {
    type Error = UnknownOrderStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "COMPLETED" => Ok(OrderStatus::Completed),
            _ => Err(UnknownOrderStatus(value)),
        }
    }
}

/// Represents an order record from the `orders` table.
///
/// # Payment Intent
///
/// Every order references exactly one payment intent for its whole lifetime.
/// The intent id never changes once the order exists; only the intent's
/// amount and payment method are updated.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,

    pub user_id: Uuid,

    #[sqlx(try_from = "String")]
    pub status: OrderStatus,

    /// Total in cents, synced from the cart on every checkout
    pub total_cents: i64,

    pub payment_intent_id: String,

    /// Only handed out alongside a checkout response
    #[serde(skip_serializing)]
    pub payment_intent_client_secret: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order line snapshot joined with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Unit price at the time of checkout
    pub unit_price_cents: i64,
    pub product: Product,
}

/// Order with its line snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub order_items: Vec<OrderLine>,
}

/// Line snapshot written at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

impl NewOrderLine {
    /// Snapshot every line of `cart` at the product's current price.
    pub fn snapshot(cart: &CartDetails) -> Vec<NewOrderLine> {
        cart.cart_items
            .iter()
            .map(|line| NewOrderLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price_cents: line.product.price_cents,
            })
            .collect()
    }
}

/// Everything needed to open a new pending order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub total_cents: i64,
    pub payment_intent_id: String,
    pub payment_intent_client_secret: String,
    pub lines: Vec<NewOrderLine>,
}

/// Response body for `POST /api/cart/checkout`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    #[serde(flatten)]
    pub order: OrderDetails,
    pub client_secret: String,
}

/// Request body for `POST /api/orders/{id}/confirm`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOrderRequest {
    #[validate(length(min = 1))]
    pub payment_method_id: String,
}

/// Response body for `POST /api/orders/{id}/confirm`, echoing the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOrderResponse {
    pub payment_intent: String,
    pub payment_method: Option<String>,
    pub payment_status: IntentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_storage_text() {
        for status in [OrderStatus::Pending, OrderStatus::Completed] {
            let parsed = OrderStatus::try_from(status.as_str().to_string()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = OrderStatus::try_from("CANCELLED".to_string()).unwrap_err();
        assert_eq!(err.0, "CANCELLED");
    }

    #[test]
    fn status_serializes_uppercase() {
        let json = serde_json::to_string(&OrderStatus::Pending).unwrap();
        assert_eq!(json, "\"PENDING\"");
    }
}
