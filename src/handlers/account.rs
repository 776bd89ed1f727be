//! Session introspection, account lookup and the product catalog.

use axum::{
    Extension, Json,
    extract::{Query, State},
};

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        product::{Product, ProductQuery},
        user::{AccountResponse, SessionResponse},
    },
    services::{auth_service, product_service},
    state::AppState,
};

/// Describe the caller's session.
///
/// # Response
///
/// ```json
/// { "sessionId": "…", "userId": "…", "isLoggedIn": true }
/// ```
///
/// Anonymous callers get nulls and `isLoggedIn: false`.
pub async fn get_session(auth: Option<Extension<AuthContext>>) -> Json<SessionResponse> {
    match auth {
        Some(Extension(auth)) => Json(SessionResponse {
            session_id: Some(auth.session_id),
            user_id: Some(auth.user_id),
            is_logged_in: true,
        }),
        None => Json(SessionResponse::anonymous()),
    }
}

/// The signed-in user's account.
pub async fn get_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = auth_service::get_account(&state.pool, auth.user_id).await?;

    Ok(Json(account))
}

/// List products, or search them with `?search=`.
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = product_service::list_products(&state.pool, query.search.as_deref()).await?;

    Ok(Json(products))
}
