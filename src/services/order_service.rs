//! Order lifecycle - checkout, confirmation and user-scoped reads.
//!
//! # Consistency Between Order And Intent
//!
//! A user has at most one `PENDING` order and every order is bound to a
//! single payment intent for its whole life. Checkout always talks to the
//! gateway first and only then writes locally, so a gateway failure leaves
//! the database untouched. The reverse case (gateway succeeded, local write
//! failed) leaves an orphan intent that is never charged.

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    gateway::{
        CURRENCY, ConfirmParams, Consent, GatewayError, IntentStatus, IntentUpdate, PaymentGateway,
    },
    models::{
        cart::Owner,
        order::{CheckoutResponse, ConfirmOrderResponse, NewOrder, NewOrderLine, OrderDetails},
    },
    repositories::{CartStore, OrderStore},
};

/// Inputs for confirming an order's payment.
#[derive(Debug, Clone)]
pub struct ConfirmInput {
    pub payment_method_id: String,
    /// Front-end origin the payer returns to after any redirect
    pub return_origin: String,
    pub consent: Consent,
}

fn gateway_failure(operation: &'static str, err: GatewayError) -> AppError {
    if err.is_invalid_request() {
        error!(operation, error = %err, "gateway rejected request as invalid");
    } else {
        error!(operation, error = %err, "gateway call failed");
    }
    AppError::Gateway(err)
}

/// Build `{origin}/success`, the page the payer returns to.
fn success_url(origin: &str) -> Result<String, AppError> {
    let base = url::Url::parse(origin)
        .map_err(|_| AppError::Validation(format!("Invalid return origin: {origin}")))?;
    let url = base
        .join("/success")
        .map_err(|_| AppError::Validation(format!("Invalid return origin: {origin}")))?;
    Ok(url.to_string())
}

/// Turn the user's cart into their pending order.
///
/// # Process
///
/// 1. Load the cart; no cart or no lines is `EmptyCart`
/// 2. No pending order: create an intent for the cart total, then insert the
///    order with its line snapshot
/// 3. Pending order: update its intent to the cart total, then replace the
///    snapshot and total
///
/// The cart itself is left as is; it is only deleted on confirmation.
#[instrument(skip(carts, orders, gateway))]
pub async fn checkout(
    carts: &dyn CartStore,
    orders: &dyn OrderStore,
    gateway: &dyn PaymentGateway,
    user_id: Uuid,
) -> Result<CheckoutResponse, AppError> {
    let cart = carts
        .find_cart(Owner::User(user_id))
        .await?
        .filter(|cart| !cart.is_empty())
        .ok_or(AppError::EmptyCart)?;

    let total_cents = cart.cart.total_cents;
    let lines = NewOrderLine::snapshot(&cart);

    match orders.find_pending(user_id).await? {
        None => {
            let intent = gateway
                .create_intent(total_cents, CURRENCY)
                .await
                .map_err(|err| gateway_failure("create_intent", err))?;

            let client_secret = intent.client_secret.clone().ok_or_else(|| {
                gateway_failure(
                    "create_intent",
                    GatewayError::Decode("payment intent has no client secret".to_string()),
                )
            })?;
            let order = orders
                .create_pending(NewOrder {
                    user_id,
                    total_cents,
                    payment_intent_id: intent.id,
                    payment_intent_client_secret: client_secret.clone(),
                    lines,
                })
                .await?;

            info!(order_id = %order.order.id, total_cents, "pending order created");
            Ok(CheckoutResponse {
                order,
                client_secret,
            })
        }
        Some(pending) => {
            gateway
                .update_intent(
                    &pending.order.payment_intent_id,
                    IntentUpdate {
                        amount_cents: total_cents,
                        payment_method: None,
                    },
                )
                .await
                .map_err(|err| gateway_failure("update_intent", err))?;

            let order = orders
                .resync_pending(pending.order.id, total_cents, lines)
                .await?;

            info!(order_id = %order.order.id, total_cents, "pending order resynced");
            let client_secret = order.order.payment_intent_client_secret.clone();
            Ok(CheckoutResponse {
                order,
                client_secret,
            })
        }
    }
}

/// Attach a payment method to the order's intent and confirm it.
///
/// # Process
///
/// 1. Resolve the cart and the user's order (both must exist)
/// 2. Update the intent's amount to the cart total and set the payment method
/// 3. Confirm the intent with the return URL and the payer's consent
/// 4. Delete the cart, whatever the confirmation outcome
/// 5. If the gateway reports `succeeded`, mark the order completed
///
/// The webhook may complete the order as well; both paths apply the same
/// declarative update.
#[instrument(skip(carts, orders, gateway, input), fields(payment_method = %input.payment_method_id))]
pub async fn confirm(
    carts: &dyn CartStore,
    orders: &dyn OrderStore,
    gateway: &dyn PaymentGateway,
    user_id: Uuid,
    order_id: Uuid,
    input: ConfirmInput,
) -> Result<ConfirmOrderResponse, AppError> {
    let cart = carts
        .find_cart(Owner::User(user_id))
        .await?
        .ok_or(AppError::NotFound("Cart not found"))?;

    let order = orders
        .find_for_user(user_id, order_id)
        .await?
        .ok_or(AppError::NotFound("Order not found"))?;

    let return_url = success_url(&input.return_origin)?;
    let intent_id = order.order.payment_intent_id;

    gateway
        .update_intent(
            &intent_id,
            IntentUpdate {
                amount_cents: cart.cart.total_cents,
                payment_method: Some(input.payment_method_id),
            },
        )
        .await
        .map_err(|err| gateway_failure("update_intent", err))?;

    let confirmed = gateway
        .confirm_intent(
            &intent_id,
            ConfirmParams {
                return_url,
                consent: input.consent,
            },
        )
        .await;

    // The payer has attempted payment; the cart goes regardless of outcome
    carts.delete_cart(cart.cart.id).await?;

    let intent = confirmed.map_err(|err| gateway_failure("confirm_intent", err))?;

    if intent.status == IntentStatus::Succeeded {
        match orders.complete_by_intent(&intent.id).await? {
            Some(order) => info!(order_id = %order.id, "order completed on confirmation"),
            None => warn!(payment_intent = %intent.id, "confirmed intent matches no order"),
        }
    } else {
        info!(status = ?intent.status, "intent not yet succeeded, order left pending");
    }

    Ok(ConfirmOrderResponse {
        payment_intent: intent.id,
        payment_method: intent.payment_method,
        payment_status: intent.status,
    })
}

/// The user's pending order.
pub async fn get_current_order(
    orders: &dyn OrderStore,
    user_id: Uuid,
) -> Result<OrderDetails, AppError> {
    orders
        .find_pending(user_id)
        .await?
        .ok_or(AppError::NotFound("Order not found"))
}

/// All of the user's orders, newest first. May be empty.
pub async fn get_orders(orders: &dyn OrderStore, user_id: Uuid) -> Result<Vec<OrderDetails>, AppError> {
    orders.list_for_user(user_id).await
}

/// One of the user's orders; someone else's order reads as missing.
pub async fn get_order(
    orders: &dyn OrderStore,
    user_id: Uuid,
    order_id: Uuid,
) -> Result<OrderDetails, AppError> {
    orders
        .find_for_user(user_id, order_id)
        .await?
        .ok_or(AppError::NotFound("Order not found"))
}
