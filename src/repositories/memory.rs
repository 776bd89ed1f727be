//! In-memory cart and order stores for service tests.
//!
//! Mirrors the PostgreSQL stores' semantics: clamped line deltas, a running
//! cart total, one pending order per user and declarative completion.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        cart::{Cart, CartDetails, CartLine, LineChange, Owner},
        order::{NewOrder, NewOrderLine, Order, OrderDetails, OrderLine, OrderStatus},
        product::Product,
    },
    repositories::{CartStore, OrderStore},
};

#[derive(Debug, Default)]
struct State {
    products: Vec<Product>,
    carts: Vec<CartDetails>,
    orders: Vec<OrderDetails>,
    /// Fail the next order write, to simulate a storage failure
    fail_next_order_write: bool,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, name: &str, price_cents: i64) -> Product {
        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: format!("{name} description"),
            price_cents,
            image_url: None,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().products.push(product.clone());
        product
    }

    pub fn orders(&self) -> Vec<OrderDetails> {
        self.state.lock().unwrap().orders.clone()
    }

    pub fn cart_count(&self) -> usize {
        self.state.lock().unwrap().carts.len()
    }

    pub fn fail_next_order_write(&self) {
        self.state.lock().unwrap().fail_next_order_write = true;
    }

    fn lines_for(products: &[Product], lines: &[NewOrderLine]) -> Vec<OrderLine> {
        lines
            .iter()
            .filter_map(|line| {
                let product = products.iter().find(|p| p.id == line.product_id)?.clone();
                Some(OrderLine {
                    id: Uuid::new_v4(),
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price_cents,
                    product,
                })
            })
            .collect()
    }
}

fn matches_owner(cart: &Cart, owner: Owner) -> bool {
    cart.owner() == Some(owner)
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.products.iter().find(|p| p.id == product_id).cloned())
    }

    async fn find_cart(&self, owner: Owner) -> Result<Option<CartDetails>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .carts
            .iter()
            .find(|c| matches_owner(&c.cart, owner))
            .cloned())
    }

    async fn create_cart(
        &self,
        owner: Owner,
        product: &Product,
        quantity: i32,
    ) -> Result<CartDetails, AppError> {
        let mut state = self.state.lock().unwrap();
        if state.carts.iter().any(|c| matches_owner(&c.cart, owner)) {
            return Err(AppError::Conflict("Cart already exists"));
        }
        let (user_id, guest_token) = match owner {
            Owner::User(id) => (Some(id), None),
            Owner::Guest(token) => (None, Some(token)),
        };
        let now = Utc::now();
        let details = CartDetails {
            cart: Cart {
                id: Uuid::new_v4(),
                user_id,
                guest_token,
                total_cents: product.price_cents * i64::from(quantity),
                created_at: now,
                updated_at: now,
            },
            cart_items: vec![CartLine {
                id: Uuid::new_v4(),
                product_id: product.id,
                quantity,
                product: product.clone(),
            }],
        };
        state.carts.push(details.clone());
        Ok(details)
    }

    async fn apply_line_change(
        &self,
        cart_id: Uuid,
        product: &Product,
        quantity: i32,
    ) -> Result<CartDetails, AppError> {
        let mut state = self.state.lock().unwrap();
        let details = state
            .carts
            .iter_mut()
            .find(|c| c.cart.id == cart_id)
            .ok_or(AppError::NotFound("Cart not found"))?;

        let current = details
            .cart_items
            .iter()
            .find(|l| l.product_id == product.id)
            .map_or(0, |l| l.quantity);
        let change = LineChange::compute(current, quantity)?;

        if change.removes_line() {
            details.cart_items.retain(|l| l.product_id != product.id);
        } else if let Some(line) = details
            .cart_items
            .iter_mut()
            .find(|l| l.product_id == product.id)
        {
            line.quantity += change.applied;
        } else {
            details.cart_items.push(CartLine {
                id: Uuid::new_v4(),
                product_id: product.id,
                quantity: change.applied,
                product: product.clone(),
            });
        }

        details.cart.total_cents += change.total_delta(product.price_cents);
        details.cart.updated_at = Utc::now();
        Ok(details.clone())
    }

    async fn delete_cart(&self, cart_id: Uuid) -> Result<(), AppError> {
        self.state
            .lock()
            .unwrap()
            .carts
            .retain(|c| c.cart.id != cart_id);
        Ok(())
    }

    async fn adopt_guest_cart(&self, token: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock().unwrap();
        if state.carts.iter().any(|c| c.cart.user_id == Some(user_id)) {
            return Ok(false);
        }
        match state
            .carts
            .iter_mut()
            .find(|c| matches_owner(&c.cart, Owner::Guest(token)))
        {
            Some(details) => {
                details.cart.user_id = Some(user_id);
                details.cart.guest_token = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_pending(&self, user_id: Uuid) -> Result<Option<OrderDetails>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .orders
            .iter()
            .find(|o| o.order.user_id == user_id && o.order.status == OrderStatus::Pending)
            .cloned())
    }

    async fn create_pending(&self, new_order: NewOrder) -> Result<OrderDetails, AppError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next_order_write) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        let now = Utc::now();
        let details = OrderDetails {
            order: Order {
                id: Uuid::new_v4(),
                user_id: new_order.user_id,
                status: OrderStatus::Pending,
                total_cents: new_order.total_cents,
                payment_intent_id: new_order.payment_intent_id,
                payment_intent_client_secret: new_order.payment_intent_client_secret,
                created_at: now,
                updated_at: now,
            },
            order_items: Self::lines_for(&state.products, &new_order.lines),
        };
        state.orders.push(details.clone());
        Ok(details)
    }

    async fn resync_pending(
        &self,
        order_id: Uuid,
        total_cents: i64,
        lines: Vec<NewOrderLine>,
    ) -> Result<OrderDetails, AppError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next_order_write) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        let items = Self::lines_for(&state.products, &lines);
        let details = state
            .orders
            .iter_mut()
            .find(|o| o.order.id == order_id && o.order.status == OrderStatus::Pending)
            .ok_or(AppError::Conflict("Order is no longer pending"))?;
        details.order.total_cents = total_cents;
        details.order.updated_at = Utc::now();
        details.order_items = items;
        Ok(details.clone())
    }

    async fn find_for_user(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<OrderDetails>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .orders
            .iter()
            .find(|o| o.order.id == order_id && o.order.user_id == user_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderDetails>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .orders
            .iter()
            .filter(|o| o.order.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn complete_by_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, AppError> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .orders
            .iter_mut()
            .find(|o| o.order.payment_intent_id == payment_intent_id)
            .map(|o| {
                o.order.status = OrderStatus::Completed;
                o.order.clone()
            }))
    }
}
