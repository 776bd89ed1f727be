//! Cart service - adds, removes and reads cart lines.
//!
//! # Running Total
//!
//! A cart's total is a counter moved by `price * applied_delta` on every line
//! change. It is never recomputed by summing lines, so the stored total is
//! exactly what the sequence of changes produced.

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    db,
    error::AppError,
    models::cart::{CartDetails, Owner},
    repositories::CartStore,
};

/// Fetch the owner's cart.
///
/// "No owner" and "no cart" both return `Ok(None)`; neither is an error.
pub async fn get_cart(
    carts: &dyn CartStore,
    owner: Option<Owner>,
) -> Result<Option<CartDetails>, AppError> {
    match owner {
        Some(owner) => carts.find_cart(owner).await,
        None => Ok(None),
    }
}

/// Add `quantity` units of a product to the owner's cart (negative removes).
///
/// # Process
///
/// 1. Reject a zero quantity before touching storage
/// 2. Look up the product
/// 3. Apply the delta to the existing cart, or create the cart with this line
///
/// # Errors
///
/// - `Validation`: quantity is zero, or negative when no cart exists yet
/// - `NotFound`: product does not exist
/// - `Database`: storage failure
#[instrument(skip(carts))]
pub async fn add_item(
    carts: &dyn CartStore,
    owner: Owner,
    product_id: Uuid,
    quantity: i32,
) -> Result<CartDetails, AppError> {
    if quantity == 0 {
        return Err(AppError::Validation(
            "Quantity must not be zero".to_string(),
        ));
    }

    let product = carts
        .find_product(product_id)
        .await?
        .ok_or(AppError::NotFound("Product not found"))?;

    if let Some(existing) = carts.find_cart(owner).await? {
        return carts
            .apply_line_change(existing.cart.id, &product, quantity)
            .await;
    }

    if quantity < 0 {
        return Err(AppError::Validation(
            "Quantity must be positive when starting a cart".to_string(),
        ));
    }

    match carts.create_cart(owner, &product, quantity).await {
        Ok(created) => {
            info!(cart_id = %created.cart.id, owner = ?created.cart.owner(), "cart created");
            Ok(created)
        }
        // A concurrent first add created the cart between our read and write
        Err(AppError::Database(ref err)) if db::is_unique_violation(err) => {
            debug!("cart created concurrently, applying change to it");
            let existing = carts
                .find_cart(owner)
                .await?
                .ok_or(AppError::NotFound("Cart not found"))?;
            carts
                .apply_line_change(existing.cart.id, &product, quantity)
                .await
        }
        Err(err) => Err(err),
    }
}

/// Hand a guest's cart over to a user who just signed in.
///
/// Only happens when the user has no cart of their own.
pub async fn adopt_guest_cart(
    carts: &dyn CartStore,
    guest_token: Uuid,
    user_id: Uuid,
) -> Result<bool, AppError> {
    let adopted = carts.adopt_guest_cart(guest_token, user_id).await?;
    if adopted {
        info!(%user_id, "guest cart adopted");
    }
    Ok(adopted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::memory::MemoryStore;

    fn line_sum(cart: &CartDetails) -> i64 {
        cart.cart_items
            .iter()
            .map(|l| l.product.price_cents * i64::from(l.quantity))
            .sum()
    }

    #[tokio::test]
    async fn add_then_decrement_keeps_running_total() {
        let store = MemoryStore::new();
        let p = store.add_product("Mug", 500);
        let owner = Owner::User(Uuid::new_v4());

        let cart = add_item(&store, owner, p.id, 2).await.unwrap();
        assert_eq!(cart.cart.total_cents, 1000);
        assert_eq!(cart.cart_items.len(), 1);
        assert_eq!(cart.cart_items[0].quantity, 2);

        let cart = add_item(&store, owner, p.id, -1).await.unwrap();
        assert_eq!(cart.cart.total_cents, 500);
        assert_eq!(cart.cart_items[0].quantity, 1);
    }

    #[tokio::test]
    async fn total_matches_lines_over_a_sequence() {
        let store = MemoryStore::new();
        let a = store.add_product("A", 300);
        let b = store.add_product("B", 1250);
        let owner = Owner::Guest(Uuid::new_v4());

        let steps = [(a.id, 3), (b.id, 1), (a.id, -1), (b.id, 4), (a.id, -7), (b.id, -2)];
        for (product_id, qty) in steps {
            let cart = add_item(&store, owner, product_id, qty).await.unwrap();
            assert_eq!(cart.cart.total_cents, line_sum(&cart));
            assert!(cart.cart_items.iter().all(|l| l.quantity > 0));
        }

        let cart = get_cart(&store, Some(owner)).await.unwrap().unwrap();
        assert_eq!(cart.cart_items.len(), 1);
        assert_eq!(cart.cart.total_cents, 3 * 1250);
    }

    #[tokio::test]
    async fn removing_more_than_held_drops_the_line() {
        let store = MemoryStore::new();
        let p = store.add_product("Pen", 200);
        let q = store.add_product("Pad", 700);
        let owner = Owner::User(Uuid::new_v4());

        add_item(&store, owner, p.id, 1).await.unwrap();
        add_item(&store, owner, q.id, 1).await.unwrap();
        let cart = add_item(&store, owner, p.id, -5).await.unwrap();

        assert_eq!(cart.cart_items.len(), 1);
        assert_eq!(cart.cart_items[0].product_id, q.id);
        assert_eq!(cart.cart.total_cents, 700);
    }

    #[tokio::test]
    async fn overflowing_line_is_rejected_and_cart_unchanged() {
        let store = MemoryStore::new();
        let p = store.add_product("Bolt", 1);
        let owner = Owner::User(Uuid::new_v4());

        add_item(&store, owner, p.id, i32::MAX).await.unwrap();
        let err = add_item(&store, owner, p.id, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let cart = get_cart(&store, Some(owner)).await.unwrap().unwrap();
        assert_eq!(cart.cart_items[0].quantity, i32::MAX);
        assert_eq!(cart.cart.total_cents, i64::from(i32::MAX));
        assert_eq!(cart.cart.total_cents, line_sum(&cart));
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let store = MemoryStore::new();
        let err = add_item(&store, Owner::User(Uuid::new_v4()), Uuid::new_v4(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(store.cart_count(), 0);
    }

    #[tokio::test]
    async fn zero_and_negative_first_adds_are_rejected() {
        let store = MemoryStore::new();
        let p = store.add_product("Cup", 100);
        let owner = Owner::User(Uuid::new_v4());

        let zero = add_item(&store, owner, p.id, 0).await.unwrap_err();
        let negative = add_item(&store, owner, p.id, -1).await.unwrap_err();

        assert!(matches!(zero, AppError::Validation(_)));
        assert!(matches!(negative, AppError::Validation(_)));
        assert_eq!(store.cart_count(), 0);
    }

    #[tokio::test]
    async fn missing_cart_reads_as_none() {
        let store = MemoryStore::new();
        assert!(get_cart(&store, None).await.unwrap().is_none());
        assert!(
            get_cart(&store, Some(Owner::User(Uuid::new_v4())))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn guest_cart_is_adopted_once() {
        let store = MemoryStore::new();
        let p = store.add_product("Hat", 900);
        let token = Uuid::new_v4();
        let user = Uuid::new_v4();

        add_item(&store, Owner::Guest(token), p.id, 1).await.unwrap();

        assert!(adopt_guest_cart(&store, token, user).await.unwrap());
        assert!(!adopt_guest_cart(&store, token, user).await.unwrap());

        let cart = get_cart(&store, Some(Owner::User(user))).await.unwrap().unwrap();
        assert_eq!(cart.cart.total_cents, 900);
        assert!(get_cart(&store, Some(Owner::Guest(token))).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn guest_cart_is_not_adopted_over_an_existing_user_cart() {
        let store = MemoryStore::new();
        let p = store.add_product("Hat", 900);
        let token = Uuid::new_v4();
        let user = Uuid::new_v4();

        add_item(&store, Owner::User(user), p.id, 2).await.unwrap();
        add_item(&store, Owner::Guest(token), p.id, 1).await.unwrap();

        assert!(!adopt_guest_cart(&store, token, user).await.unwrap());
        let cart = get_cart(&store, Some(Owner::User(user))).await.unwrap().unwrap();
        assert_eq!(cart.cart.total_cents, 1800);
    }
}
