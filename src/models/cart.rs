//! Cart data models and API request/response types.
//!
//! This module defines:
//! - `Owner`: who a cart belongs to (an authenticated user or a guest token)
//! - `Cart` / `CartLine`: the stored cart and its line items with product details
//! - `AddItemRequest`: request body for `POST /api/cart`
//! - `LineChange`: the clamped quantity arithmetic shared by every cart store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{error::AppError, models::product::Product};

/// Identity a cart is addressed by.
///
/// Ownership is mutually exclusive: a cart row carries either a `user_id`
/// or a `guest_token`, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Authenticated user
    User(Uuid),
    /// Anonymous visitor holding an opaque token in the `cart_token` cookie
    Guest(Uuid),
}

/// Represents a cart record from the `carts` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: Uuid,

    pub user_id: Option<Uuid>,

    /// Never serialized; the token only travels in its cookie
    #[serde(skip_serializing)]
    pub guest_token: Option<Uuid>,

    /// Running total in cents.
    ///
    /// Maintained incrementally by every line change, never summed at read time.
    pub total_cents: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn owner(&self) -> Option<Owner> {
        match (self.user_id, self.guest_token) {
            (Some(user_id), _) => Some(Owner::User(user_id)),
            (None, Some(token)) => Some(Owner::Guest(token)),
            (None, None) => None,
        }
    }
}

/// A cart line joined with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub product: Product,
}

/// Cart with its lines, as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartDetails {
    #[serde(flatten)]
    pub cart: Cart,
    pub cart_items: Vec<CartLine>,
}

impl CartDetails {
    pub fn is_empty(&self) -> bool {
        self.cart_items.is_empty()
    }
}

/// Request body for adding (or removing) units of a product.
///
/// # JSON Example
///
/// ```json
/// { "productId": "550e8400-e29b-41d4-a716-446655440000", "quantity": -1 }
/// ```
///
/// A negative quantity decrements the line; zero is rejected.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = -1000, max = 1000))]
    pub quantity: i32,
}

/// Outcome of applying a quantity delta to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineChange {
    /// Delta actually applied; the total moves by `price * applied`
    pub applied: i32,
    /// Quantity left on the line; zero means the line is deleted
    pub quantity: i32,
}

impl LineChange {
    /// Apply `requested` to a line currently holding `current` units.
    ///
    /// Decrements are clamped at the current quantity so a line never
    /// persists at zero or below. An increment that would overflow the line
    /// is rejected and leaves the cart untouched.
    pub fn compute(current: i32, requested: i32) -> Result<Self, AppError> {
        let applied = requested.max(-current);
        let quantity = current.checked_add(applied).ok_or_else(|| {
            AppError::Validation("Quantity exceeds the maximum for a cart line".to_string())
        })?;
        Ok(Self { applied, quantity })
    }

    pub fn removes_line(&self) -> bool {
        self.quantity <= 0
    }

    /// Change to the cart's running total for a product priced `price_cents`.
    pub fn total_delta(&self, price_cents: i64) -> i64 {
        price_cents * i64::from(self.applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_adds_to_line() {
        let change = LineChange::compute(2, 3).unwrap();
        assert_eq!(change, LineChange { applied: 3, quantity: 5 });
        assert!(!change.removes_line());
        assert_eq!(change.total_delta(500), 1500);
    }

    #[test]
    fn decrement_to_exactly_zero_removes_line() {
        let change = LineChange::compute(2, -2).unwrap();
        assert_eq!(change.quantity, 0);
        assert!(change.removes_line());
        assert_eq!(change.total_delta(500), -1000);
    }

    #[test]
    fn decrement_past_zero_is_clamped() {
        let change = LineChange::compute(1, -5).unwrap();
        assert_eq!(change, LineChange { applied: -1, quantity: 0 });
        assert_eq!(change.total_delta(250), -250);
    }

    #[test]
    fn decrement_on_missing_line_is_a_no_op() {
        let change = LineChange::compute(0, -3).unwrap();
        assert_eq!(change.applied, 0);
        assert!(change.removes_line());
    }

    #[test]
    fn increment_past_line_capacity_is_rejected() {
        let err = LineChange::compute(i32::MAX, 1).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let change = LineChange::compute(i32::MAX, -1).unwrap();
        assert_eq!(change.quantity, i32::MAX - 1);
    }

    #[test]
    fn request_quantity_is_bounded() {
        let request = |quantity| AddItemRequest {
            product_id: Uuid::new_v4(),
            quantity,
        };
        assert!(request(1000).validate().is_ok());
        assert!(request(-1000).validate().is_ok());
        assert!(request(1001).validate().is_err());
        assert!(request(i32::MIN).validate().is_err());
    }

    #[test]
    fn guest_cart_owner() {
        let token = Uuid::new_v4();
        let cart = Cart {
            id: Uuid::new_v4(),
            user_id: None,
            guest_token: Some(token),
            total_cents: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(cart.owner(), Some(Owner::Guest(token)));
    }
}
