//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Authenticate requests
//! - Short-circuit requests (reject unauthenticated)

/// Session cookie authentication middleware
pub mod auth;

/// Cookie helpers shared by middleware and handlers
pub mod cookies;
