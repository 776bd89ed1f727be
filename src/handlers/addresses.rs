//! HTTP handlers for the signed-in user's shipping addresses.

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use validator::Validate;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::address::{
        AddressResponse, CreateAddressRequest, DeleteAddressRequest, EditAddressRequest,
    },
    services::address_service,
    state::AppState,
};

/// List addresses, each with an `isDefault` flag.
pub async fn list_addresses(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<AddressResponse>>, AppError> {
    let addresses = address_service::list_addresses(&state.pool, auth.user_id).await?;

    Ok(Json(addresses))
}

/// Create an address.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Home",
///   "isDefault": true,
///   "address": "Rua das Flores",
///   "number": 42,
///   "zip": "01000-000",
///   "complement": "Apt 3"
/// }
/// ```
///
/// Returns 201, or 409 when the name is already used by this user.
pub async fn create_address(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateAddressRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let address = address_service::create_address(&state.pool, auth.user_id, request).await?;

    Ok((StatusCode::CREATED, Json(address)))
}

/// Edit an address; omitted fields keep their values.
pub async fn edit_address(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<EditAddressRequest>,
) -> Result<Json<AddressResponse>, AppError> {
    request.validate()?;

    let address = address_service::edit_address(&state.pool, auth.user_id, request).await?;

    Ok(Json(address))
}

pub async fn delete_address(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<DeleteAddressRequest>,
) -> Result<StatusCode, AppError> {
    address_service::delete_address(&state.pool, auth.user_id, request.id).await?;

    Ok(StatusCode::OK)
}
