//! Accounts, sessions and password recovery.
//!
//! # Tokens
//!
//! Session and recovery tokens are 32 random bytes, hex encoded, given to the
//! client once. The database only ever sees their SHA-256 hash, so a leaked
//! table cannot be replayed as cookies.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::{self, DbPool},
    error::AppError,
    models::user::{
        AccountResponse, ChangePasswordRequest, PasswordRecoveryRequest, Session, SigninRequest,
        SignupRequest, User,
    },
};

/// Recovery tokens expire after five minutes.
const RECOVERY_TOKEN_TTL_MINUTES: i64 = 5;

/// Generate a 64 hex character token (32 random bytes).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// SHA-256 of a token, hex encoded.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::PasswordHash(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::PasswordHash(e.to_string()))
}

/// Check `password` against a stored PHC string. Unparseable hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn find_user_by_email(pool: &DbPool, email: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Register a new user.
///
/// # Errors
///
/// - `Conflict`: e-mail already registered
#[instrument(skip(pool, request), fields(email = %request.email))]
pub async fn signup(pool: &DbPool, request: SignupRequest) -> Result<User, AppError> {
    let password_hash = hash_password(&request.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, name, password_hash)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(normalize_email(&request.email))
    .bind(&request.name)
    .bind(&password_hash)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::Conflict("Email already exists")
        } else {
            AppError::Database(e)
        }
    })?;

    info!(user_id = %user.id, "user signed up");
    Ok(user)
}

/// Check credentials and open a session.
///
/// Returns the new session together with the raw token for the cookie.
#[instrument(skip(pool, request), fields(email = %request.email))]
pub async fn signin(
    pool: &DbPool,
    request: SigninRequest,
    ttl_hours: i64,
) -> Result<(Session, String), AppError> {
    let user = find_user_by_email(pool, &request.email)
        .await?
        .ok_or(AppError::InvalidCredentials("Email not found"))?;

    if !verify_password(&request.password, &user.password_hash) {
        warn!(user_id = %user.id, "incorrect password");
        return Err(AppError::InvalidCredentials("Incorrect password"));
    }

    create_session(pool, user.id, ttl_hours).await
}

pub async fn create_session(
    pool: &DbPool,
    user_id: Uuid,
    ttl_hours: i64,
) -> Result<(Session, String), AppError> {
    let token = generate_token();
    let expires_at = Utc::now() + Duration::hours(ttl_hours);

    let session = sqlx::query_as::<_, Session>(
        r#"
        INSERT INTO sessions (token_hash, user_id, expires_at)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(hash_token(&token))
    .bind(user_id)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    info!(%user_id, session_id = %session.id, "session opened");
    Ok((session, token))
}

/// Resolve a cookie token to its unexpired session.
pub async fn find_session(pool: &DbPool, token: &str) -> Result<Option<Session>, AppError> {
    let session = sqlx::query_as::<_, Session>(
        "SELECT * FROM sessions WHERE token_hash = $1 AND expires_at > NOW()",
    )
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

pub async fn destroy_session(pool: &DbPool, token: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
        .bind(hash_token(token))
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn get_account(pool: &DbPool, user_id: Uuid) -> Result<AccountResponse, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    Ok(AccountResponse {
        id: user.id,
        email: user.email,
        name: user.name,
    })
}

/// Issue a short-lived recovery token for the account.
///
/// The token is returned to the caller; delivering it is out of scope here.
#[instrument(skip(pool, request), fields(email = %request.email))]
pub async fn issue_recovery_token(
    pool: &DbPool,
    request: PasswordRecoveryRequest,
) -> Result<String, AppError> {
    let user = find_user_by_email(pool, &request.email)
        .await?
        .ok_or(AppError::InvalidCredentials("Email not found"))?;

    let token = generate_token();
    let expires_at = Utc::now() + Duration::minutes(RECOVERY_TOKEN_TTL_MINUTES);

    sqlx::query(
        r#"
        INSERT INTO password_recovery_tokens (user_id, token_hash, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(user.id)
    .bind(hash_token(&token))
    .bind(expires_at)
    .execute(pool)
    .await?;

    info!(user_id = %user.id, "recovery token issued");
    Ok(token)
}

/// Change a password through either flow.
///
/// # Flows
///
/// - `password-recovery`: proven by an unexpired recovery token for the
///   account; every outstanding token of the user is consumed
/// - `default`: requires a session belonging to the same account
///
/// # Errors
///
/// - `Validation`: password and confirmation differ
/// - `InvalidCredentials`: unknown e-mail or bad recovery token
/// - `Unauthenticated`: default flow without a matching session
#[instrument(skip(pool, request), fields(email = %request.email()))]
pub async fn change_password(
    pool: &DbPool,
    request: ChangePasswordRequest,
    session_user: Option<Uuid>,
) -> Result<(), AppError> {
    if !request.passwords_match() {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }

    let user = find_user_by_email(pool, request.email())
        .await?
        .ok_or(AppError::InvalidCredentials("Email not found"))?;

    let new_hash = hash_password(request.password())?;

    match &request {
        ChangePasswordRequest::PasswordRecovery { recovery_token, .. } => {
            let mut tx = pool.begin().await?;

            let valid: Option<Uuid> = sqlx::query_scalar(
                r#"
                SELECT id FROM password_recovery_tokens
                WHERE user_id = $1 AND token_hash = $2 AND expires_at > NOW()
                "#,
            )
            .bind(user.id)
            .bind(hash_token(recovery_token))
            .fetch_optional(&mut *tx)
            .await?;

            if valid.is_none() {
                tx.rollback().await?;
                return Err(AppError::InvalidCredentials("Invalid recovery token"));
            }

            sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
                .bind(&new_hash)
                .bind(user.id)
                .execute(&mut *tx)
                .await?;

            sqlx::query("DELETE FROM password_recovery_tokens WHERE user_id = $1")
                .bind(user.id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
        }
        ChangePasswordRequest::Default { .. } => {
            if session_user != Some(user.id) {
                return Err(AppError::Unauthenticated);
            }

            sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
                .bind(&new_hash)
                .bind(user.id)
                .execute(pool)
                .await?;
        }
    }

    info!(user_id = %user.id, "password changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("x", "not-a-phc-string"));
    }

    #[test]
    fn tokens_are_random_and_hash_deterministically() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(hash_token(&a), hash_token(&a));
        assert_ne!(hash_token(&a), a);
        assert_eq!(hash_token(&a).len(), 64);
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
    }
}
