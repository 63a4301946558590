//! Customer order route handlers. Every route requires a bearer token.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use mindy_munchs_core::validation::optional_length;
use mindy_munchs_core::{OrderId, OrderStatus, PaymentMethod, PaymentStatus};

use crate::db::orders::{NewOrder, StatusChange};
use crate::db::{OrderRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path};
use crate::middleware::RequireAuth;
use crate::models::{CurrentUser, Order, ShippingAddress};
use crate::services::{EmailService, Notification};
use crate::state::AppState;

/// Longest order note accepted at checkout.
const MAX_NOTES_LENGTH: usize = 500;

/// Checkout request body.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Whether `current` may see `order`.
pub(crate) fn can_view(current: &CurrentUser, order: &Order) -> bool {
    order.user_id == current.user.id || current.user.is_admin()
}

/// The customer-cancel decision for an order owned by `current`.
fn customer_cancel(
    current: &CurrentUser,
    order: &Order,
) -> std::result::Result<StatusChange, RepositoryError> {
    if order.user_id != current.user.id {
        return Err(RepositoryError::NotFound);
    }
    if !order.status.is_cancellable_by_customer() {
        return Err(RepositoryError::Conflict(format!(
            "Orders that are {} can no longer be cancelled",
            order.status
        )));
    }

    // Refunds are issued by hand in the gateway dashboard.
    let payment_status =
        (order.payment_status == PaymentStatus::Paid).then_some(PaymentStatus::Refunded);

    Ok(StatusChange {
        status: Some(OrderStatus::Cancelled),
        payment_status,
        gateway_payment_id: None,
    })
}

fn order_not_found(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound("Order not found".into()),
        other => other.into(),
    }
}

/// Place an order from the caller's cart.
///
/// POST /api/orders
#[instrument(skip_all, fields(user_id = %current.user.id, payment_method = %body.payment_method))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let shipping_address = body.shipping_address.validate()?;
    let notes = optional_length("notes", body.notes.as_deref(), MAX_NOTES_LENGTH)?;

    let order = OrderRepository::new(state.pool())
        .place(NewOrder {
            user_id: current.user.id,
            shipping_address,
            payment_method: body.payment_method,
            notes,
        })
        .await?;

    state
        .catalog()
        .invalidate_products(&order.product_ids())
        .await;

    tracing::info!(order_id = %order.id, total = %order.total, "Order placed");

    // Online orders are confirmed once the payment is captured.
    if order.payment_method == PaymentMethod::Cod {
        EmailService::notify(
            state.email(),
            Notification::OrderConfirmation {
                to: current.user.email.clone(),
                name: current.user.name.clone(),
                order: order.clone(),
            },
        );
    }

    Ok((StatusCode::CREATED, Json(order)))
}

/// The caller's orders, newest first.
///
/// GET /api/orders
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(current.user.id)
        .await?;
    Ok(Json(orders))
}

/// One order. Customers see only their own; admins see any.
///
/// GET /api/orders/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .filter(|order| can_view(&current, order))
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    Ok(Json(order))
}

/// Cancel one of the caller's orders while it is still pending or processing.
///
/// POST /api/orders/{id}/cancel
#[instrument(skip_all, fields(user_id = %current.user.id, order_id = %id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let update = OrderRepository::new(state.pool())
        .change_status(id, |order| customer_cancel(&current, order))
        .await
        .map_err(order_not_found)?;

    if update.restocked {
        state
            .catalog()
            .invalidate_products(&update.order.product_ids())
            .await;
    }

    tracing::info!(
        previous_payment_status = %update.previous_payment_status,
        "Order cancelled by customer"
    );

    Ok(Json(update.order))
}
