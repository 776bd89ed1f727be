//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::gateway::GatewayError;
use crate::services::webhook_service::WebhookError;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Validation Errors**: malformed input, rejected before any side effect
/// - **Authentication Errors**: missing session or wrong credentials
/// - **Resource Errors**: user-scoped resources that do not exist (or belong to someone else)
/// - **Conflict Errors**: uniqueness violations translated into domain messages
/// - **Gateway Errors**: payment processor failures, surfaced opaquely
/// - **Webhook Errors**: signature or payload failures on inbound events
/// - **Database Errors**: any other sqlx::Error
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("{0}")]
    Validation(String),

    /// Checkout attempted without any cart lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// No valid session on a route that requires one.
    #[error("User is not authenticated")]
    Unauthenticated,

    /// Sign-in or token check failed; the message says which part.
    #[error("{0}")]
    InvalidCredentials(&'static str),

    /// Requested resource does not exist or is not visible to this user.
    ///
    /// Returns HTTP 404 Not Found. Foreign resources are reported the same way.
    #[error("{0}")]
    NotFound(&'static str),

    /// Uniqueness violation, e.g. duplicate e-mail or address name.
    #[error("{0}")]
    Conflict(&'static str),

    /// Payment gateway call failed.
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Inbound webhook failed verification or could not be parsed.
    #[error("Webhook rejected: {0}")]
    Webhook(#[from] WebhookError),

    /// Password hashing failed.
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `Validation`, `EmptyCart`, `Webhook` → 400 Bad Request
/// - `Unauthenticated`, `InvalidCredentials` → 401 Unauthorized
/// - `NotFound` → 404 Not Found
/// - `Conflict` → 409 Conflict
/// - `Gateway`, `Database`, `PasswordHash` → 500 Internal Server Error (details hidden)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Validation(ref msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            AppError::EmptyCart => (StatusCode::BAD_REQUEST, "empty_cart", self.to_string()),
            AppError::Webhook(_) => (
                StatusCode::BAD_REQUEST,
                "webhook_rejected",
                "Webhook could not be verified".to_string(),
            ),
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                self.to_string(),
            ),
            AppError::InvalidCredentials(_) => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                self.to_string(),
            ),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict", self.to_string()),
            AppError::Gateway(ref err) => {
                tracing::error!(error = %err, "payment gateway failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "payment_error",
                    "Payment could not be processed".to_string(),
                )
            }
            AppError::Database(ref err) => {
                tracing::error!(error = %err, "database failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::PasswordHash(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (AppError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::EmptyCart, StatusCode::BAD_REQUEST),
            (AppError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (AppError::NotFound("Order not found"), StatusCode::NOT_FOUND),
            (AppError::Conflict("Email already exists"), StatusCode::CONFLICT),
            (
                AppError::Gateway(GatewayError::Http("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Webhook(WebhookError::MissingSignature),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Database(sqlx::Error::RowNotFound),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
