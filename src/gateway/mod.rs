//! Payment gateway adapter.
//!
//! The order lifecycle only needs three payment-intent operations, so the
//! gateway is modelled as a narrow trait. `StripeClient` is the production
//! implementation; tests substitute a scripted fake.

pub mod stripe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::stripe::StripeClient;

/// The only currency this store charges in.
pub const CURRENCY: &str = "usd";

/// Lifecycle status of a payment intent as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
}

/// Minimal payment-intent shape mirrored from the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: IntentStatus,
    pub amount: i64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

/// Fields changed on an existing intent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentUpdate {
    pub amount_cents: i64,
    pub payment_method: Option<String>,
}

/// Payer consent captured for an online confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consent {
    pub ip_address: String,
    pub user_agent: String,
}

/// Parameters for synchronous confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmParams {
    pub return_url: String,
    pub consent: Consent,
}

/// Failures reported by (or while talking to) the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request was rejected as invalid (bad amount, unknown intent, ...).
    #[error("invalid request: {message} (code={code:?} param={param:?})")]
    InvalidRequest {
        message: String,
        code: Option<String>,
        param: Option<String>,
    },

    /// The card was declined or could not be charged.
    #[error("card error: {message} (decline_code={decline_code:?})")]
    Card {
        message: String,
        decline_code: Option<String>,
    },

    /// Any other error envelope returned by the gateway.
    #[error("gateway error {kind} (status={status}): {message}")]
    Api {
        kind: String,
        status: u16,
        message: String,
    },

    #[error("http error: {0}")]
    Http(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, GatewayError::InvalidRequest { .. })
    }
}

/// Narrow contract over the external payment-intent API.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a new intent for `amount_cents` in `currency`.
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Change the amount and, optionally, the payment method of an intent.
    async fn update_intent(
        &self,
        intent_id: &str,
        update: IntentUpdate,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Ask the gateway to confirm the intent synchronously.
    async fn confirm_intent(
        &self,
        intent_id: &str,
        params: ConfirmParams,
    ) -> Result<PaymentIntent, GatewayError>;
}
