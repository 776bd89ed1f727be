//! HTTP handlers for the cart and checkout.

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    middleware::{
        auth::AuthContext,
        cookies::{self, CART_COOKIE},
    },
    models::cart::{AddItemRequest, CartDetails, Owner},
    services::{cart_service, order_service},
    state::AppState,
};

/// The cart owner for this request: the session user, else the guest token.
fn resolve_owner(auth: Option<&AuthContext>, headers: &HeaderMap) -> Option<Owner> {
    match auth {
        Some(auth) => Some(Owner::User(auth.user_id)),
        None => cookies::guest_token(headers).map(Owner::Guest),
    }
}

/// The caller's cart, or `null` when there is none.
pub async fn get_cart(
    State(state): State<AppState>,
    auth: Option<Extension<AuthContext>>,
    headers: HeaderMap,
) -> Result<Json<Option<CartDetails>>, AppError> {
    let owner = resolve_owner(auth.as_ref().map(|Extension(a)| a), &headers);
    let cart = cart_service::get_cart(state.carts.as_ref(), owner).await?;

    Ok(Json(cart))
}

/// Add units of a product to the cart; a negative quantity removes units.
///
/// # Request Body
///
/// ```json
/// { "productId": "550e8400-e29b-41d4-a716-446655440000", "quantity": 2 }
/// ```
///
/// # Guests
///
/// A caller with neither a session nor a cart token is issued a new token in
/// an http-only `cart_token` cookie along with the new cart.
pub async fn add_item(
    State(state): State<AppState>,
    auth: Option<Extension<AuthContext>>,
    headers: HeaderMap,
    Json(request): Json<AddItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let (owner, issued_token) =
        match resolve_owner(auth.as_ref().map(|Extension(a)| a), &headers) {
            Some(owner) => (owner, None),
            None => {
                let token = Uuid::new_v4();
                (Owner::Guest(token), Some(token))
            }
        };

    let cart = cart_service::add_item(
        state.carts.as_ref(),
        owner,
        request.product_id,
        request.quantity,
    )
    .await?;

    let set_cookies: Vec<(HeaderName, HeaderValue)> = issued_token
        .map(|token| {
            (
                SET_COOKIE,
                cookies::set_cookie(
                    CART_COOKIE,
                    &token.to_string(),
                    state.config.cookie_max_age_secs(),
                    state.config.secure_cookies(),
                ),
            )
        })
        .into_iter()
        .collect();

    Ok((AppendHeaders(set_cookies), Json(cart)))
}

/// Turn the signed-in user's cart into their pending order.
///
/// # Response (201 Created)
///
/// The order with its line snapshot plus `clientSecret` for the payment
/// form. Repeated checkouts return the same order, resynced to the cart.
pub async fn checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let response = order_service::checkout(
        state.carts.as_ref(),
        state.orders.as_ref(),
        state.gateway.as_ref(),
        auth.user_id,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}
