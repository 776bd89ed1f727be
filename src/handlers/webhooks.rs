//! HTTP handler for payment-gateway webhooks.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use serde_json::{Value, json};

use crate::{
    error::AppError,
    services::webhook_service::{self, SIGNATURE_HEADER},
    state::AppState,
};

/// Receive a gateway event.
///
/// The body is taken as raw bytes: the signature covers them exactly, so it
/// is verified before any JSON parsing.
///
/// # Responses
///
/// - 200 `{"received": true, "result": {"outcome": ...}}`: handled, ignored
///   or unmatched
/// - 400: bad signature, stale timestamp or malformed payload
/// - 500: completion could not be stored; the gateway retries
pub async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    webhook_service::verify_signature(
        &body,
        signature,
        &state.config.stripe_webhook_secret,
        state.config.webhook_tolerance_secs,
    )?;

    let event = webhook_service::parse_event(&body)?;
    let outcome = webhook_service::handle_event(state.orders.as_ref(), event).await?;

    Ok(Json(json!({ "received": true, "result": outcome })))
}
