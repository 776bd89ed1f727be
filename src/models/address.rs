//! Shipping address models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Represents a row of the `shipment_addresses` table.
///
/// Address names are unique per user.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentAddress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub address: String,
    pub number: i32,
    pub zip: String,
    pub complement: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Address plus whether it is the user's default.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressResponse {
    #[serde(flatten)]
    pub address: ShipmentAddress,
    pub is_default: bool,
}

impl AddressResponse {
    pub fn new(address: ShipmentAddress, default_id: Option<Uuid>) -> Self {
        let is_default = default_id == Some(address.id);
        Self {
            address,
            is_default,
        }
    }
}

/// Request body for `POST /api/address/shipping`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAddressRequest {
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    #[serde(default)]
    pub is_default: bool,

    #[validate(length(min = 1))]
    pub address: String,

    #[validate(length(min = 1, max = 16))]
    pub zip: String,

    #[validate(range(min = 0))]
    pub number: i32,

    pub complement: Option<String>,
}

/// Request body for `PATCH /api/address/shipping`.
///
/// Omitted fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EditAddressRequest {
    pub id: Uuid,

    #[serde(default)]
    pub is_default: bool,

    #[validate(length(min = 12, message = "Address must have at least 12 characters"))]
    pub address: Option<String>,

    #[validate(length(min = 1, max = 16))]
    pub zip: Option<String>,

    #[validate(range(min = 0))]
    pub number: Option<i32>,

    pub complement: Option<String>,
}

/// Request body for `DELETE /api/address/shipping`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteAddressRequest {
    pub id: Uuid,
}
