//! Inbound payment-gateway webhooks.
//!
//! Events are authenticated with the `Stripe-Signature` header before the
//! body is parsed. The only event acted on is `payment_intent.succeeded`,
//! which completes the order bound to that intent. Completion is a
//! declarative update, so redelivery and races with the synchronous confirm
//! path are harmless.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{error::AppError, repositories::OrderStore};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the `t=<unix>,v1=<hex>` signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";

/// Reasons an inbound webhook is rejected.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook secret is not configured")]
    MissingSecret,

    #[error("missing signature header")]
    MissingSignature,

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("timestamp outside tolerance: {0}")]
    TimestampTolerance(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Event envelope as delivered by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct IntentObject {
    id: String,
}

/// What handling an event amounted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum WebhookOutcome {
    Completed { order_id: Uuid },
    UnmatchedIntent { payment_intent_id: String },
    Ignored { event_type: String },
}

fn parse_header(header: &str) -> Result<(i64, Vec<&str>), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| WebhookError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(WebhookError::InvalidSignature(
            "no v1 signature".to_string(),
        ));
    }

    Ok((timestamp, signatures))
}

fn signed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Verify `header` against `payload` as of `now` (unix seconds).
///
/// An empty `secret` rejects every event.
pub fn verify_signature_at(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), WebhookError> {
    if secret.is_empty() {
        return Err(WebhookError::MissingSecret);
    }
    let header = header.ok_or(WebhookError::MissingSignature)?;
    let (timestamp, signatures) = parse_header(header)?;

    let age = (now - timestamp).abs();
    if age > tolerance_secs {
        return Err(WebhookError::TimestampTolerance(format!(
            "timestamp {timestamp} is {age}s from now (tolerance {tolerance_secs}s)"
        )));
    }

    let mac = signed_mac(secret, timestamp, payload)?;
    // verify_slice compares in constant time
    let valid = signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if !valid {
        return Err(WebhookError::InvalidSignature(
            "no signature matched".to_string(),
        ));
    }

    debug!(timestamp, "webhook signature verified");
    Ok(())
}

/// Verify `header` against `payload` using the current time.
pub fn verify_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    tolerance_secs: i64,
) -> Result<(), WebhookError> {
    verify_signature_at(payload, header, secret, tolerance_secs, Utc::now().timestamp())
}

/// Parse a verified body into an event envelope.
pub fn parse_event(payload: &[u8]) -> Result<StripeEvent, WebhookError> {
    serde_json::from_slice(payload).map_err(|e| WebhookError::MalformedPayload(e.to_string()))
}

/// Apply a verified event.
///
/// # Errors
///
/// - `Webhook`: the event's object is not a payment intent
/// - `Database`: the completion could not be written (the sender retries)
#[instrument(skip(orders, event), fields(event_id = %event.id, event_type = %event.event_type))]
pub async fn handle_event(
    orders: &dyn OrderStore,
    event: StripeEvent,
) -> Result<WebhookOutcome, AppError> {
    if event.event_type != PAYMENT_INTENT_SUCCEEDED {
        info!("ignoring webhook event");
        return Ok(WebhookOutcome::Ignored {
            event_type: event.event_type,
        });
    }

    let intent: IntentObject = serde_json::from_value(event.data.object)
        .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

    match orders.complete_by_intent(&intent.id).await? {
        Some(order) => {
            info!(order_id = %order.id, payment_intent = %intent.id, "order completed by webhook");
            Ok(WebhookOutcome::Completed { order_id: order.id })
        }
        None => {
            warn!(payment_intent = %intent.id, "succeeded intent matches no order");
            Ok(WebhookOutcome::UnmatchedIntent {
                payment_intent_id: intent.id,
            })
        }
    }
}

/// Build a `Stripe-Signature` header value for `payload`.
#[cfg(test)]
pub fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mac = signed_mac(secret, timestamp, payload).unwrap();
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gateway::fake::FakeGateway,
        models::{cart::Owner, order::OrderStatus},
        repositories::memory::MemoryStore,
        services::{cart_service, order_service},
    };

    const SECRET: &str = "whsec_test_secret";

    fn succeeded(intent_id: &str) -> Vec<u8> {
        serde_json::json!({
            "id": "evt_1",
            "type": PAYMENT_INTENT_SUCCEEDED,
            "data": { "object": { "id": intent_id, "object": "payment_intent" } }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn accepts_valid_signature() {
        let body = succeeded("pi_1");
        let header = sign(SECRET, 1_700_000_000, &body);
        verify_signature_at(&body, Some(&header), SECRET, 300, 1_700_000_100).unwrap();
    }

    #[test]
    fn accepts_any_matching_v1_entry() {
        let body = succeeded("pi_1");
        let valid = sign(SECRET, 1_700_000_000, &body);
        let sig = valid.split_once(",v1=").unwrap().1;
        let header = format!("t=1700000000,v1=deadbeef,v1={sig}");
        verify_signature_at(&body, Some(&header), SECRET, 300, 1_700_000_000).unwrap();
    }

    #[test]
    fn empty_secret_rejects_even_matching_signature() {
        let body = succeeded("pi_1");
        let header = sign("", 1_700_000_000, &body);
        let err =
            verify_signature_at(&body, Some(&header), "", 300, 1_700_000_000).unwrap_err();
        assert!(matches!(err, WebhookError::MissingSecret));
    }

    #[test]
    fn rejects_missing_header() {
        let err = verify_signature_at(b"{}", None, SECRET, 300, 0).unwrap_err();
        assert!(matches!(err, WebhookError::MissingSignature));
    }

    #[test]
    fn rejects_tampered_body_and_wrong_secret() {
        let body = succeeded("pi_1");
        let header = sign(SECRET, 1_700_000_000, &body);

        let tampered = succeeded("pi_2");
        let err =
            verify_signature_at(&tampered, Some(&header), SECRET, 300, 1_700_000_000).unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature(_)));

        let err = verify_signature_at(&body, Some(&header), "whsec_other", 300, 1_700_000_000)
            .unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature(_)));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let body = succeeded("pi_1");
        let header = sign(SECRET, 1_700_000_000, &body);
        let err =
            verify_signature_at(&body, Some(&header), SECRET, 300, 1_700_000_301).unwrap_err();
        assert!(matches!(err, WebhookError::TimestampTolerance(_)));
    }

    #[test]
    fn rejects_header_without_parts() {
        for header in ["", "v1=abcd", "t=1700000000", "t=abc,v1=abcd"] {
            let err = verify_signature_at(b"{}", Some(header), SECRET, 300, 1_700_000_000)
                .unwrap_err();
            assert!(matches!(err, WebhookError::InvalidSignature(_)), "{header}");
        }
    }

    #[test]
    fn malformed_body_fails_to_parse() {
        let err = parse_event(b"not json").unwrap_err();
        assert!(matches!(err, WebhookError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn unknown_event_type_is_ignored() {
        let store = MemoryStore::new();
        let event = parse_event(
            br#"{"id":"evt_2","type":"charge.refunded","data":{"object":{"id":"ch_1"}}}"#,
        )
        .unwrap();

        let outcome = handle_event(&store, event).await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                event_type: "charge.refunded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn unmatched_intent_is_acknowledged() {
        let store = MemoryStore::new();
        let event = parse_event(&succeeded("pi_unknown")).unwrap();

        let outcome = handle_event(&store, event).await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::UnmatchedIntent {
                payment_intent_id: "pi_unknown".to_string()
            }
        );
    }

    #[tokio::test]
    async fn full_lifecycle_ends_completed_however_often_webhook_arrives() {
        let store = MemoryStore::new();
        let gateway = FakeGateway::new();
        let user = Uuid::new_v4();
        let p = store.add_product("Mug", 500);

        let cart = cart_service::add_item(&store, Owner::User(user), p.id, 2).await.unwrap();
        assert_eq!(cart.cart.total_cents, 1000);
        let cart = cart_service::add_item(&store, Owner::User(user), p.id, -1).await.unwrap();
        assert_eq!(cart.cart.total_cents, 500);

        let checkout = order_service::checkout(&store, &store, &gateway, user)
            .await
            .unwrap();
        assert_eq!(checkout.order.order.total_cents, 500);
        assert_eq!(checkout.order.order.status, OrderStatus::Pending);
        let intent = checkout.order.order.payment_intent_id.clone();
        let order_id = checkout.order.order.id;

        // webhook first, then the synchronous confirm, then a redelivery
        let event = parse_event(&succeeded(&intent)).unwrap();
        assert_eq!(
            handle_event(&store, event.clone()).await.unwrap(),
            WebhookOutcome::Completed { order_id }
        );

        let input = order_service::ConfirmInput {
            payment_method_id: "pm_card_visa".to_string(),
            return_origin: "http://localhost:8001".to_string(),
            consent: crate::gateway::Consent {
                ip_address: "127.0.0.1".to_string(),
                user_agent: "test".to_string(),
            },
        };
        order_service::confirm(&store, &store, &gateway, user, order_id, input)
            .await
            .unwrap();
        handle_event(&store, event).await.unwrap();

        let order = order_service::get_order(&store, user, order_id).await.unwrap();
        assert_eq!(order.order.status, OrderStatus::Completed);
        assert_eq!(store.cart_count(), 0);
    }
}
