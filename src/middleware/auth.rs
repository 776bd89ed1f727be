//! Session authentication middleware.
//!
//! `load_session` runs on every request:
//! 1. Read the session token from the `sid` cookie
//! 2. Hash it and look up an unexpired session
//! 3. If found, attach an `AuthContext` to the request
//!
//! Routes that need a signed-in user are additionally wrapped in
//! `require_auth`, which rejects requests without a context with HTTP 401.
//! Handlers with optional auth extract `Option<Extension<AuthContext>>`.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::cookies::{self, SESSION_COOKIE},
    services::auth_service,
    state::AppState,
};

/// Authentication context attached to requests with a valid session.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Owner of the session; scopes every cart, order and address query
    pub user_id: Uuid,

    pub session_id: Uuid,
}

/// Resolve the session cookie, if any, into an `AuthContext`.
///
/// Requests without a cookie never touch the database. An unknown or expired
/// token simply leaves the request anonymous.
pub async fn load_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(token) = cookies::read_cookie(request.headers(), SESSION_COOKIE) {
        if let Some(session) = auth_service::find_session(&state.pool, &token).await? {
            request.extensions_mut().insert(AuthContext {
                user_id: session.user_id,
                session_id: session.id,
            });
        }
    }

    Ok(next.run(request).await)
}

/// Reject requests that `load_session` did not authenticate.
pub async fn require_auth(request: Request, next: Next) -> Result<Response, AppError> {
    if request.extensions().get::<AuthContext>().is_none() {
        return Err(AppError::Unauthenticated);
    }

    Ok(next.run(request).await)
}
