//! HTTP handlers for the signed-in user's orders.

use std::net::SocketAddr;

use axum::{
    Extension, Json,
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, header},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    gateway::Consent,
    middleware::auth::AuthContext,
    models::order::{ConfirmOrderRequest, ConfirmOrderResponse, OrderDetails},
    services::order_service::{self, ConfirmInput},
    state::AppState,
};

/// Payer consent for an online confirmation, taken from the request.
///
/// The client IP prefers the first `X-Forwarded-For` entry over the socket
/// peer, since the service normally runs behind a proxy.
fn consent_from(headers: &HeaderMap, peer: Option<SocketAddr>) -> Consent {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty());

    let ip_address = forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "0.0.0.0".to_string());

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    Consent {
        ip_address,
        user_agent,
    }
}

/// Every order of the signed-in user, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<OrderDetails>>, AppError> {
    let orders = order_service::get_orders(state.orders.as_ref(), auth.user_id).await?;

    Ok(Json(orders))
}

/// The signed-in user's pending order (404 when there is none).
pub async fn current_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<OrderDetails>, AppError> {
    let order = order_service::get_current_order(state.orders.as_ref(), auth.user_id).await?;

    Ok(Json(order))
}

/// One order by id; orders of other users read as 404.
pub async fn get_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDetails>, AppError> {
    let order = order_service::get_order(state.orders.as_ref(), auth.user_id, order_id).await?;

    Ok(Json(order))
}

/// Confirm payment of an order with a payment method.
///
/// # Request Body
///
/// ```json
/// { "paymentMethodId": "pm_card_visa" }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "paymentIntent": "pi_3Nx...",
///   "paymentMethod": "pm_card_visa",
///   "paymentStatus": "succeeded"
/// }
/// ```
///
/// The cart is deleted once the confirmation has been attempted. A status
/// other than `succeeded` (e.g. `requires_action`) leaves the order pending
/// until the gateway's webhook arrives.
pub async fn confirm_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    peer: Option<Extension<ConnectInfo<SocketAddr>>>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<ConfirmOrderRequest>,
) -> Result<Json<ConfirmOrderResponse>, AppError> {
    request.validate()?;

    let return_origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| state.config.cors_origin.clone());

    let input = ConfirmInput {
        payment_method_id: request.payment_method_id,
        return_origin,
        consent: consent_from(&headers, peer.map(|Extension(ConnectInfo(addr))| addr)),
    };

    let response = order_service::confirm(
        state.carts.as_ref(),
        state.orders.as_ref(),
        state.gateway.as_ref(),
        auth.user_id,
        order_id,
        input,
    )
    .await?;

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn consent_prefers_forwarded_ip() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.4, 10.0.0.1"),
        );
        headers.insert(header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();

        let consent = consent_from(&headers, Some(peer));

        assert_eq!(consent.ip_address, "198.51.100.4");
        assert_eq!(consent.user_agent, "Mozilla/5.0");
    }

    #[test]
    fn consent_falls_back_to_peer_address() {
        let peer: SocketAddr = "192.0.2.9:443".parse().unwrap();
        let consent = consent_from(&HeaderMap::new(), Some(peer));

        assert_eq!(consent.ip_address, "192.0.2.9");
        assert_eq!(consent.user_agent, "");
    }
}
