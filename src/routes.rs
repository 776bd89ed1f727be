//! Route table.
//!
//! Every request first passes `load_session`; the signed-in-only group is
//! additionally wrapped in `require_auth`.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::{handlers, middleware, state::AppState};

pub fn router(state: AppState) -> Router {
    let authenticated_routes = Router::new()
        .route("/api/account", get(handlers::account::get_account))
        // Shipping addresses
        .route(
            "/api/address/shipping",
            get(handlers::addresses::list_addresses)
                .post(handlers::addresses::create_address)
                .patch(handlers::addresses::edit_address)
                .delete(handlers::addresses::delete_address),
        )
        .route("/api/cart/checkout", post(handlers::cart::checkout))
        // Orders
        .route("/api/orders", get(handlers::orders::list_orders))
        .route("/api/orders/orders", get(handlers::orders::list_orders))
        .route("/api/orders/current", get(handlers::orders::current_order))
        .route("/api/orders/{id}", get(handlers::orders::get_order))
        .route(
            "/api/orders/{id}/confirm",
            post(handlers::orders::confirm_order),
        )
        .route_layer(axum_middleware::from_fn(middleware::auth::require_auth));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/session", get(handlers::account::get_session))
        .route("/api/products", get(handlers::account::list_products))
        // Authentication
        .route("/api/auth/signup", post(handlers::auth::signup))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route(
            "/api/auth/password-recovery",
            post(handlers::auth::password_recovery),
        )
        .route(
            "/api/auth/change-password",
            post(handlers::auth::change_password),
        )
        // Cart (optional auth)
        .route(
            "/api/cart",
            get(handlers::cart::get_cart).post(handlers::cart::add_item),
        )
        .route("/api/webhook", post(handlers::webhooks::receive_event))
        .merge(authenticated_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::load_session,
        ))
        .with_state(state)
}
