//! Persistence seams for the cart and order lifecycle.
//!
//! Services depend on these traits rather than on a pool so that tests can
//! run the lifecycle against in-memory stores.

pub mod cart_store;
#[cfg(test)]
pub mod memory;
pub mod order_store;

pub use cart_store::{CartStore, PgCartStore};
pub use order_store::{OrderStore, PgOrderStore};
