//! Cart persistence.
//!
//! Line changes are applied under row locks inside a database transaction:
//! the line quantity and the cart's running total are both moved by the
//! same clamped delta, never recomputed from the lines.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        cart::{Cart, CartDetails, CartLine, LineChange, Owner},
        product::Product,
    },
};

/// Storage operations the cart service relies on.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError>;

    /// The owner's cart with lines and product details, if one exists.
    async fn find_cart(&self, owner: Owner) -> Result<Option<CartDetails>, AppError>;

    /// Create a cart holding a single line of `quantity` units.
    async fn create_cart(
        &self,
        owner: Owner,
        product: &Product,
        quantity: i32,
    ) -> Result<CartDetails, AppError>;

    /// Apply a quantity delta to one line of an existing cart.
    async fn apply_line_change(
        &self,
        cart_id: Uuid,
        product: &Product,
        quantity: i32,
    ) -> Result<CartDetails, AppError>;

    async fn delete_cart(&self, cart_id: Uuid) -> Result<(), AppError>;

    /// Move a guest cart to `user_id` and retire its token.
    ///
    /// Returns `false` when there was nothing to adopt.
    async fn adopt_guest_cart(&self, token: Uuid, user_id: Uuid) -> Result<bool, AppError>;
}

/// PostgreSQL-backed cart store.
#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: DbPool,
}

impl PgCartStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_details(&self, cart: Cart) -> Result<CartDetails, AppError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r#"
            SELECT ci.id, ci.product_id, ci.quantity,
                   p.name, p.description, p.price_cents, p.image_url,
                   p.created_at AS product_created_at
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.created_at, ci.id
            "#,
        )
        .bind(cart.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(CartDetails {
            cart,
            cart_items: rows.into_iter().map(Into::into).collect(),
        })
    }

    async fn fetch_cart(&self, cart_id: Uuid) -> Result<CartDetails, AppError> {
        let cart = sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE id = $1")
            .bind(cart_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("Cart not found"))?;

        self.load_details(cart).await
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: Uuid,
    product_id: Uuid,
    quantity: i32,
    name: String,
    description: String,
    price_cents: i64,
    image_url: Option<String>,
    product_created_at: DateTime<Utc>,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            product: Product {
                id: row.product_id,
                name: row.name,
                description: row.description,
                price_cents: row.price_cents,
                image_url: row.image_url,
                created_at: row.product_created_at,
            },
        }
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    async fn find_cart(&self, owner: Owner) -> Result<Option<CartDetails>, AppError> {
        let query = match owner {
            Owner::User(user_id) => {
                sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE user_id = $1").bind(user_id)
            }
            Owner::Guest(token) => sqlx::query_as::<_, Cart>(
                "SELECT * FROM carts WHERE guest_token = $1 AND user_id IS NULL",
            )
            .bind(token),
        };

        match query.fetch_optional(&self.pool).await? {
            Some(cart) => Ok(Some(self.load_details(cart).await?)),
            None => Ok(None),
        }
    }

    async fn create_cart(
        &self,
        owner: Owner,
        product: &Product,
        quantity: i32,
    ) -> Result<CartDetails, AppError> {
        let (user_id, guest_token) = match owner {
            Owner::User(user_id) => (Some(user_id), None),
            Owner::Guest(token) => (None, Some(token)),
        };

        let mut tx = self.pool.begin().await?;

        let cart = sqlx::query_as::<_, Cart>(
            r#"
            INSERT INTO carts (user_id, guest_token, total_cents)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(guest_token)
        .bind(product.price_cents * i64::from(quantity))
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO cart_items (cart_id, product_id, quantity) VALUES ($1, $2, $3)")
            .bind(cart.id)
            .bind(product.id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.load_details(cart).await
    }

    async fn apply_line_change(
        &self,
        cart_id: Uuid,
        product: &Product,
        quantity: i32,
    ) -> Result<CartDetails, AppError> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent changes to the same cart
        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM carts WHERE id = $1 FOR UPDATE")
                .bind(cart_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            tx.rollback().await?;
            return Err(AppError::NotFound("Cart not found"));
        }

        let current: Option<i32> = sqlx::query_scalar(
            "SELECT quantity FROM cart_items WHERE cart_id = $1 AND product_id = $2 FOR UPDATE",
        )
        .bind(cart_id)
        .bind(product.id)
        .fetch_optional(&mut *tx)
        .await?;

        let change = LineChange::compute(current.unwrap_or(0), quantity)?;

        if change.removes_line() {
            sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
                .bind(cart_id)
                .bind(product.id)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO cart_items (cart_id, product_id, quantity)
                VALUES ($1, $2, $3)
                ON CONFLICT (cart_id, product_id)
                DO UPDATE SET quantity = cart_items.quantity + $3
                "#,
            )
            .bind(cart_id)
            .bind(product.id)
            .bind(change.applied)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE carts
            SET total_cents = total_cents + $1,
                updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(change.total_delta(product.price_cents))
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.fetch_cart(cart_id).await
    }

    async fn delete_cart(&self, cart_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(cart_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn adopt_guest_cart(&self, token: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let adopted = sqlx::query(
            r#"
            UPDATE carts
            SET user_id = $1,
                guest_token = NULL,
                updated_at = NOW()
            WHERE guest_token = $2
              AND user_id IS NULL
              AND NOT EXISTS (SELECT 1 FROM carts WHERE user_id = $1)
            "#,
        )
        .bind(user_id)
        .bind(token)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(adopted > 0)
    }
}
