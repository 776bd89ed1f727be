//! HTTP handlers for sign-up, sign-in, sign-out and password changes.

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use serde::Serialize;
use validator::Validate;

use crate::{
    config::AppEnv,
    error::AppError,
    middleware::{
        auth::AuthContext,
        cookies::{self, CART_COOKIE, SESSION_COOKIE},
    },
    models::user::{
        ChangePasswordRequest, PasswordRecoveryRequest, SessionResponse, SigninRequest,
        SignupRequest, UserResponse,
    },
    services::{auth_service, cart_service},
    state::AppState,
};

/// Plain message body, e.g. `{"message": "Password updated successfully"}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: &'static str,

    /// Only outside production, where no mail delivery exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_token: Option<String>,
}

impl MessageResponse {
    fn new(message: &'static str) -> Self {
        Self {
            message,
            recovery_token: None,
        }
    }
}

/// Register a user.
///
/// # Request Body
///
/// ```json
/// { "email": "ana@example.com", "password": "secret", "name": "Ana" }
/// ```
///
/// Returns 201 with the user, or 409 when the e-mail is taken.
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let user = auth_service::signup(&state.pool, request).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Sign in and open a session.
///
/// # Guest Cart
///
/// If the caller carries a `cart_token` cookie and the user has no cart,
/// the guest cart becomes the user's and the cookie is cleared.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SigninRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let config = &state.config;
    let (session, token) =
        auth_service::signin(&state.pool, request, config.session_ttl_hours).await?;

    let mut set_cookies: Vec<(HeaderName, HeaderValue)> = vec![(
        SET_COOKIE,
        cookies::set_cookie(
            SESSION_COOKIE,
            &token,
            config.cookie_max_age_secs(),
            config.secure_cookies(),
        ),
    )];

    if let Some(guest_token) = cookies::guest_token(&headers) {
        if cart_service::adopt_guest_cart(state.carts.as_ref(), guest_token, session.user_id)
            .await?
        {
            set_cookies.push((
                SET_COOKIE,
                cookies::clear_cookie(CART_COOKIE, config.secure_cookies()),
            ));
        }
    }

    Ok((
        AppendHeaders(set_cookies),
        Json(SessionResponse {
            session_id: Some(session.id),
            user_id: Some(session.user_id),
            is_logged_in: true,
        }),
    ))
}

/// Destroy the caller's session, if any.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    if let Some(token) = cookies::read_cookie(&headers, SESSION_COOKIE) {
        auth_service::destroy_session(&state.pool, &token).await?;
    }

    Ok((
        AppendHeaders([(
            SET_COOKIE,
            cookies::clear_cookie(SESSION_COOKIE, state.config.secure_cookies()),
        )]),
        Json(SessionResponse::anonymous()),
    ))
}

/// Issue a five-minute recovery token for the account.
pub async fn password_recovery(
    State(state): State<AppState>,
    Json(request): Json<PasswordRecoveryRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    request.validate()?;

    let token = auth_service::issue_recovery_token(&state.pool, request).await?;

    let mut response = MessageResponse::new("Check your email for the recovery link");
    if state.config.app_env != AppEnv::Production {
        response.recovery_token = Some(token);
    }

    Ok(Json(response))
}

/// Change a password via the `password-recovery` or `default` flow.
///
/// The default flow needs a session for the same account.
pub async fn change_password(
    State(state): State<AppState>,
    auth: Option<Extension<AuthContext>>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let session_user = auth.map(|Extension(auth)| auth.user_id);

    auth_service::change_password(&state.pool, request, session_user).await?;

    Ok(Json(MessageResponse::new("Password updated successfully")))
}
