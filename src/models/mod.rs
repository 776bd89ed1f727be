//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request and response bodies built from them.

/// Shipping addresses
pub mod address;
/// Cart, cart lines and cart ownership
pub mod cart;
/// Orders and order line snapshots
pub mod order;
/// Product catalog
pub mod product;
/// Users, sessions and credentials
pub mod user;
