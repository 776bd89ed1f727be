//! Stripe REST client.
//!
//! Form-encoded payment-intent endpoints with bearer auth; error envelopes are
//! mapped into `GatewayError`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{info, instrument};

use super::{ConfirmParams, GatewayError, IntentUpdate, PaymentGateway, PaymentIntent, CURRENCY};

/// Stripe REST error envelope: `{ error: { type, code, decline_code, message, param } }`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    #[serde(rename = "type")]
    type_: String,
    code: Option<String>,
    decline_code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    api_key: String,
    api_base: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    pub fn new(http: Client, api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn map_error(status: StatusCode, body: &str) -> GatewayError {
        let Ok(env) = serde_json::from_str::<ErrorEnvelope>(body) else {
            return GatewayError::Http(format!("status={} body={}", status.as_u16(), body));
        };
        let message = env.error.message.unwrap_or_default();
        match env.error.type_.as_str() {
            "invalid_request_error" => GatewayError::InvalidRequest {
                message,
                code: env.error.code,
                param: env.error.param,
            },
            "card_error" => GatewayError::Card {
                message,
                decline_code: env.error.decline_code,
            },
            other => GatewayError::Api {
                kind: other.to_string(),
                status: status.as_u16(),
                message,
            },
        }
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<PaymentIntent, GatewayError> {
        let url = format!("{}{}", self.api_base, path);
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .form(form)
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        if status.is_success() {
            serde_json::from_str::<PaymentIntent>(&text)
                .map_err(|e| GatewayError::Decode(e.to_string()))
        } else {
            Err(Self::map_error(status, &text))
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    /// `POST /v1/payment_intents`
    #[instrument(skip(self), fields(method = "POST", path = "/v1/payment_intents"))]
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let form = vec![
            ("amount".to_string(), amount_cents.to_string()),
            ("currency".to_string(), currency.to_ascii_lowercase()),
        ];

        info!(target: "stripe", amount_cents, currency = %currency, "stripe request");

        self.post_form("/v1/payment_intents", &form).await
    }

    /// `POST /v1/payment_intents/{id}`
    #[instrument(skip(self, update), fields(method = "POST", path = "/v1/payment_intents/{id}", intent_id = %intent_id))]
    async fn update_intent(
        &self,
        intent_id: &str,
        update: IntentUpdate,
    ) -> Result<PaymentIntent, GatewayError> {
        let mut form = vec![
            ("amount".to_string(), update.amount_cents.to_string()),
            ("currency".to_string(), CURRENCY.to_string()),
        ];
        if let Some(pm) = update.payment_method {
            form.push(("payment_method".to_string(), pm));
        }

        info!(target: "stripe", amount_cents = update.amount_cents, "stripe request");

        self.post_form(&format!("/v1/payment_intents/{intent_id}"), &form)
            .await
    }

    /// `POST /v1/payment_intents/{id}/confirm`
    #[instrument(skip(self, params), fields(method = "POST", path = "/v1/payment_intents/{id}/confirm", intent_id = %intent_id))]
    async fn confirm_intent(
        &self,
        intent_id: &str,
        params: ConfirmParams,
    ) -> Result<PaymentIntent, GatewayError> {
        let form = vec![
            ("return_url".to_string(), params.return_url),
            ("use_stripe_sdk".to_string(), "true".to_string()),
            (
                "mandate_data[customer_acceptance][type]".to_string(),
                "online".to_string(),
            ),
            (
                "mandate_data[customer_acceptance][online][ip_address]".to_string(),
                params.consent.ip_address,
            ),
            (
                "mandate_data[customer_acceptance][online][user_agent]".to_string(),
                params.consent.user_agent,
            ),
        ];

        info!(target: "stripe", "stripe request");

        self.post_form(&format!("/v1/payment_intents/{intent_id}/confirm"), &form)
            .await
    }
}
