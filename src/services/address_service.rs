//! Shipping addresses and the user's default address.

use sqlx::{Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::{
    db::{self, DbPool},
    error::AppError,
    models::address::{AddressResponse, CreateAddressRequest, EditAddressRequest, ShipmentAddress},
};

async fn default_address_id(pool: &DbPool, user_id: Uuid) -> Result<Option<Uuid>, AppError> {
    let default_id: Option<Option<Uuid>> = sqlx::query_scalar(
        "SELECT default_shipping_address_id FROM user_defaults WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(default_id.flatten())
}

async fn set_default(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    address_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO user_defaults (user_id, default_shipping_address_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id)
        DO UPDATE SET default_shipping_address_id = EXCLUDED.default_shipping_address_id
        "#,
    )
    .bind(user_id)
    .bind(address_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// All of the user's addresses, each flagged with whether it is the default.
pub async fn list_addresses(pool: &DbPool, user_id: Uuid) -> Result<Vec<AddressResponse>, AppError> {
    let addresses = sqlx::query_as::<_, ShipmentAddress>(
        "SELECT * FROM shipment_addresses WHERE user_id = $1 ORDER BY created_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let default_id = default_address_id(pool, user_id).await?;

    Ok(addresses
        .into_iter()
        .map(|address| AddressResponse::new(address, default_id))
        .collect())
}

/// Create an address, optionally making it the default.
///
/// # Errors
///
/// - `Conflict`: the user already has an address with this name
pub async fn create_address(
    pool: &DbPool,
    user_id: Uuid,
    request: CreateAddressRequest,
) -> Result<AddressResponse, AppError> {
    let mut tx = pool.begin().await?;

    let address = sqlx::query_as::<_, ShipmentAddress>(
        r#"
        INSERT INTO shipment_addresses (user_id, name, address, number, zip, complement)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&request.name)
    .bind(&request.address)
    .bind(request.number)
    .bind(&request.zip)
    .bind(&request.complement)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::Conflict("Shipping address name already exists")
        } else {
            AppError::Database(e)
        }
    })?;

    if request.is_default {
        set_default(&mut tx, user_id, address.id).await?;
    }

    tx.commit().await?;

    info!(%user_id, address_id = %address.id, "shipping address created");
    Ok(AddressResponse {
        address,
        is_default: request.is_default,
    })
}

/// Update the provided fields of one of the user's addresses.
pub async fn edit_address(
    pool: &DbPool,
    user_id: Uuid,
    request: EditAddressRequest,
) -> Result<AddressResponse, AppError> {
    let mut tx = pool.begin().await?;

    let address = sqlx::query_as::<_, ShipmentAddress>(
        r#"
        UPDATE shipment_addresses
        SET address = COALESCE($1, address),
            zip = COALESCE($2, zip),
            number = COALESCE($3, number),
            complement = COALESCE($4, complement)
        WHERE id = $5 AND user_id = $6
        RETURNING *
        "#,
    )
    .bind(&request.address)
    .bind(&request.zip)
    .bind(request.number)
    .bind(&request.complement)
    .bind(request.id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(address) = address else {
        tx.rollback().await?;
        return Err(AppError::NotFound("Shipping address not found"));
    };

    if request.is_default {
        set_default(&mut tx, user_id, address.id).await?;
    }

    tx.commit().await?;

    let default_id = default_address_id(pool, user_id).await?;
    Ok(AddressResponse::new(address, default_id))
}

/// Delete one of the user's addresses. A default pointing at it is cleared by the schema.
pub async fn delete_address(pool: &DbPool, user_id: Uuid, address_id: Uuid) -> Result<(), AppError> {
    let deleted = sqlx::query("DELETE FROM shipment_addresses WHERE id = $1 AND user_id = $2")
        .bind(address_id)
        .bind(user_id)
        .execute(pool)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(AppError::NotFound("Shipping address not found"));
    }

    info!(%user_id, %address_id, "shipping address deleted");
    Ok(())
}
