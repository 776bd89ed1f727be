//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! The cart and order lifecycle run against the store and gateway traits;
//! accounts, addresses and the catalog query the pool directly.

pub mod address_service;
pub mod auth_service;
pub mod cart_service;
pub mod order_service;
pub mod product_service;
pub mod webhook_service;
