//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, cookies)
//! 2. Delegates to a service
//! 3. Returns HTTP response (JSON, status code, `Set-Cookie`)

/// Session, account and catalog endpoints
pub mod account;

/// Shipping address endpoints
pub mod addresses;

/// Sign-up, sign-in and password endpoints
pub mod auth;

/// Cart and checkout endpoints
pub mod cart;

/// Health check endpoint
pub mod health;

/// Order endpoints
pub mod orders;

/// Payment gateway webhook endpoint
pub mod webhooks;
