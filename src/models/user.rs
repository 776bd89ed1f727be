//! User, session and credential models.
//!
//! Session and recovery tokens are random values handed to the client once;
//! only their SHA-256 hashes are stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Represents a user record from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Represents a login session from the `sessions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/auth/signup`.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1, max = 256))]
    pub password: String,

    #[validate(length(min = 1, max = 256))]
    pub name: String,
}

/// Request body for `POST /api/auth/login`.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SigninRequest {
    #[validate(email)]
    pub email: String,

    pub password: String,
}

/// Request body for `POST /api/auth/password-recovery`.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PasswordRecoveryRequest {
    #[validate(email)]
    pub email: String,
}

/// Request body for `POST /api/auth/change-password`.
///
/// # JSON Example
///
/// ```json
/// {
///   "flow": "password-recovery",
///   "email": "ana@example.com",
///   "password": "new",
///   "confirmPassword": "new",
///   "recoveryToken": "9f2c..."
/// }
/// ```
#[derive(Debug, Deserialize)]
#[serde(tag = "flow", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ChangePasswordRequest {
    /// Unauthenticated flow proven by a recovery token
    PasswordRecovery {
        email: String,
        password: String,
        confirm_password: String,
        recovery_token: String,
    },
    /// Flow for a signed-in user
    Default {
        email: String,
        password: String,
        confirm_password: String,
    },
}

impl ChangePasswordRequest {
    pub fn email(&self) -> &str {
        match self {
            ChangePasswordRequest::PasswordRecovery { email, .. }
            | ChangePasswordRequest::Default { email, .. } => email,
        }
    }

    pub fn password(&self) -> &str {
        match self {
            ChangePasswordRequest::PasswordRecovery { password, .. }
            | ChangePasswordRequest::Default { password, .. } => password,
        }
    }

    pub fn passwords_match(&self) -> bool {
        match self {
            ChangePasswordRequest::PasswordRecovery {
                password,
                confirm_password,
                ..
            }
            | ChangePasswordRequest::Default {
                password,
                confirm_password,
                ..
            } => password == confirm_password,
        }
    }
}

/// Public view of a user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            created_at: user.created_at,
        }
    }
}

/// Response body for login, logout and `GET /api/session`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub is_logged_in: bool,
}

impl SessionResponse {
    pub fn anonymous() -> Self {
        Self {
            session_id: None,
            user_id: None,
            is_logged_in: false,
        }
    }
}

/// Response body for `GET /api/account`.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}
