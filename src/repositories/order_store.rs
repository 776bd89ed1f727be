//! Order persistence.
//!
//! Orders are created and resynced inside database transactions so that an
//! order row and its line snapshot always change together. Completion is a
//! declarative `SET status = 'COMPLETED'`, which makes it idempotent and
//! independent of arrival order.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        order::{NewOrder, NewOrderLine, Order, OrderDetails, OrderLine, OrderStatus},
        product::Product,
    },
};

/// Storage operations the order lifecycle relies on.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// The user's single `PENDING` order, if any.
    async fn find_pending(&self, user_id: Uuid) -> Result<Option<OrderDetails>, AppError>;

    /// Insert a `PENDING` order together with its line snapshot.
    async fn create_pending(&self, new_order: NewOrder) -> Result<OrderDetails, AppError>;

    /// Replace a pending order's snapshot and total with the cart's current state.
    async fn resync_pending(
        &self,
        order_id: Uuid,
        total_cents: i64,
        lines: Vec<NewOrderLine>,
    ) -> Result<OrderDetails, AppError>;

    /// An order owned by `user_id`; foreign orders are indistinguishable from missing ones.
    async fn find_for_user(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<OrderDetails>, AppError>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderDetails>, AppError>;

    /// Mark the order paying through `payment_intent_id` as completed.
    ///
    /// Returns `None` when no order references the intent.
    async fn complete_by_intent(&self, payment_intent_id: &str)
    -> Result<Option<Order>, AppError>;
}

/// PostgreSQL-backed order store.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: DbPool,
}

impl PgOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_lines(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderLine>>, AppError> {
        let rows = sqlx::query_as::<_, OrderLineRow>(
            r#"
            SELECT oi.id, oi.order_id, oi.product_id, oi.quantity, oi.unit_price_cents,
                   p.name, p.description, p.price_cents, p.image_url,
                   p.created_at AS product_created_at
            FROM order_items oi
            JOIN products p ON p.id = oi.product_id
            WHERE oi.order_id = ANY($1)
            ORDER BY oi.created_at, oi.id
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in rows {
            let order_id = row.order_id;
            grouped.entry(order_id).or_default().push(row.into());
        }

        Ok(grouped)
    }

    async fn with_lines(&self, orders: Vec<Order>) -> Result<Vec<OrderDetails>, AppError> {
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut lines = self.load_lines(&ids).await?;

        Ok(orders
            .into_iter()
            .map(|order| OrderDetails {
                order_items: lines.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }

    async fn one_with_lines(&self, order: Order) -> Result<OrderDetails, AppError> {
        let mut details = self.with_lines(vec![order]).await?;
        details.pop().ok_or(AppError::NotFound("Order not found"))
    }
}

async fn insert_lines(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    lines: &[NewOrderLine],
) -> Result<(), AppError> {
    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, quantity, unit_price_cents)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price_cents: i64,
    name: String,
    description: String,
    price_cents: i64,
    image_url: Option<String>,
    product_created_at: DateTime<Utc>,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
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
impl OrderStore for PgOrderStore {
    async fn find_pending(&self, user_id: Uuid) -> Result<Option<OrderDetails>, AppError> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = $1 AND status = $2",
        )
        .bind(user_id)
        .bind(OrderStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match order {
            Some(order) => Ok(Some(self.one_with_lines(order).await?)),
            None => Ok(None),
        }
    }

    async fn create_pending(&self, new_order: NewOrder) -> Result<OrderDetails, AppError> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                user_id,
                status,
                total_cents,
                payment_intent_id,
                payment_intent_client_secret
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(new_order.user_id)
        .bind(OrderStatus::Pending.as_str())
        .bind(new_order.total_cents)
        .bind(&new_order.payment_intent_id)
        .bind(&new_order.payment_intent_client_secret)
        .fetch_one(&mut *tx)
        .await?;

        insert_lines(&mut tx, order.id, &new_order.lines).await?;

        tx.commit().await?;

        self.one_with_lines(order).await
    }

    async fn resync_pending(
        &self,
        order_id: Uuid,
        total_cents: i64,
        lines: Vec<NewOrderLine>,
    ) -> Result<OrderDetails, AppError> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET total_cents = $1,
                updated_at = NOW()
            WHERE id = $2 AND status = $3
            RETURNING *
            "#,
        )
        .bind(total_cents)
        .bind(order_id)
        .bind(OrderStatus::Pending.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(order) = order else {
            tx.rollback().await?;
            return Err(AppError::Conflict("Order is no longer pending"));
        };

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        insert_lines(&mut tx, order_id, &lines).await?;

        tx.commit().await?;

        self.one_with_lines(order).await
    }

    async fn find_for_user(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<OrderDetails>, AppError> {
        let order =
            sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
                .bind(order_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        match order {
            Some(order) => Ok(Some(self.one_with_lines(order).await?)),
            None => Ok(None),
        }
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderDetails>, AppError> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.with_lines(orders).await
    }

    async fn complete_by_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, AppError> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = $1,
                updated_at = NOW()
            WHERE payment_intent_id = $2
            RETURNING *
            "#,
        )
        .bind(OrderStatus::Completed.as_str())
        .bind(payment_intent_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }
}
