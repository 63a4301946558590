//! Online payment route handlers.
//!
//! ```text
//! POST /api/payments/create-order  - Open a gateway order for an online order (auth)
//! POST /api/payments/verify        - Confirm a checkout signature (auth)
//! POST /api/payments/webhook       - Gateway push notifications (signed)
//! ```

use axum::{body::Bytes, extract::State, http::HeaderMap};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use mindy_munchs_core::{OrderId, OrderStatus, PaymentMethod, PaymentStatus};

use crate::db::orders::{StatusChange, StatusUpdate};
use crate::db::{OrderRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::extract::Json;
use crate::middleware::RequireAuth;
use crate::models::{CurrentUser, Order};
use crate::services::payments::{WebhookEvent, WebhookKind};
use crate::services::{EmailService, Notification, PaymentError};
use crate::state::AppState;

/// Header carrying the webhook body signature.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Request body for opening a gateway order.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: OrderId,
}

/// What the checkout widget needs to collect payment.
#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub key_id: String,
    pub gateway_order_id: String,
    /// Minor units (paise).
    pub amount: i64,
    pub currency: String,
}

/// Values handed back by the checkout widget.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: OrderId,
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

/// Whether an order may (re)start online payment.
fn ensure_payable(order: &Order) -> Result<()> {
    if order.payment_method != PaymentMethod::Online {
        return Err(AppError::BadRequest(
            "Order is not set up for online payment".into(),
        ));
    }
    if order.status == OrderStatus::Cancelled {
        return Err(AppError::BadRequest("Order has been cancelled".into()));
    }
    match order.payment_status {
        PaymentStatus::Pending | PaymentStatus::Failed => Ok(()),
        PaymentStatus::Paid => Err(AppError::BadRequest("Order is already paid".into())),
        PaymentStatus::Refunded => Err(AppError::BadRequest("Order has been refunded".into())),
    }
}

/// Status change for a captured payment. Already-paid orders are left alone.
fn capture_change(order: &Order, gateway_payment_id: &str) -> StatusChange {
    if order.payment_status == PaymentStatus::Paid {
        return StatusChange::default();
    }
    StatusChange {
        status: (order.status == OrderStatus::Pending).then_some(OrderStatus::Processing),
        payment_status: Some(PaymentStatus::Paid),
        gateway_payment_id: Some(gateway_payment_id.to_string()),
    }
}

/// Status change for a failed payment. A paid order never goes back to failed.
fn failure_change(order: &Order) -> StatusChange {
    match order.payment_status {
        PaymentStatus::Pending => StatusChange {
            payment_status: Some(PaymentStatus::Failed),
            ..StatusChange::default()
        },
        _ => StatusChange::default(),
    }
}

fn newly_paid(update: &StatusUpdate) -> bool {
    update.previous_payment_status != PaymentStatus::Paid
        && update.order.payment_status == PaymentStatus::Paid
}

async fn own_order(state: &AppState, current: &CurrentUser, id: OrderId) -> Result<Order> {
    OrderRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .filter(|order| order.user_id == current.user.id)
        .ok_or_else(|| AppError::NotFound("Order not found".into()))
}

/// Open a gateway order for one of the caller's online orders.
///
/// POST /api/payments/create-order
#[instrument(skip_all, fields(user_id = %current.user.id, order_id = %body.order_id))]
pub async fn create_order(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(body): Json<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>> {
    let gateway = state.payments()?;
    let order = own_order(&state, &current, body.order_id).await?;
    ensure_payable(&order)?;

    let gateway_order = gateway.create_order(order.total, &order.receipt()).await?;

    OrderRepository::new(state.pool())
        .set_gateway_order_id(order.id, &gateway_order.id)
        .await?;

    tracing::info!(gateway_order_id = %gateway_order.id, "Gateway order opened");

    Ok(Json(CreatePaymentResponse {
        key_id: gateway.key_id().to_string(),
        gateway_order_id: gateway_order.id,
        amount: gateway_order.amount,
        currency: gateway_order.currency,
    }))
}

/// Verify the checkout signature and mark the order paid.
///
/// POST /api/payments/verify
#[instrument(skip_all, fields(user_id = %current.user.id, order_id = %body.order_id))]
pub async fn verify(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(body): Json<VerifyPaymentRequest>,
) -> Result<Json<Order>> {
    let gateway = state.payments()?;
    let order = own_order(&state, &current, body.order_id).await?;
    let orders = OrderRepository::new(state.pool());

    if order.gateway_order_id.as_deref() != Some(body.gateway_order_id.as_str()) {
        tracing::warn!("Gateway order id does not match the order");
        return Err(PaymentError::InvalidSignature.into());
    }

    if let Err(e) = gateway.verify_payment_signature(
        &body.gateway_order_id,
        &body.gateway_payment_id,
        &body.signature,
    ) {
        tracing::warn!("Payment signature mismatch");
        orders
            .change_status(order.id, |o| Ok(failure_change(o)))
            .await?;
        return Err(e.into());
    }

    let update = orders
        .change_status(order.id, |o| {
            Ok(capture_change(o, &body.gateway_payment_id))
        })
        .await?;

    if newly_paid(&update) {
        tracing::info!(gateway_payment_id = %body.gateway_payment_id, "Payment verified");
        EmailService::notify(
            state.email(),
            Notification::OrderConfirmation {
                to: current.user.email.clone(),
                name: current.user.name.clone(),
                order: update.order.clone(),
            },
        );
    }

    Ok(Json(update.order))
}

/// Gateway webhook.
///
/// POST /api/payments/webhook
///
/// Always answers 200 for well-signed deliveries, including events the
/// store does not act on, so the gateway stops retrying.
#[instrument(skip_all)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let gateway = state.payments()?;

    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(PaymentError::InvalidSignature)?;
    gateway.verify_webhook_signature(&body, signature)?;

    let event = WebhookEvent::parse(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {e}")))?;
    let kind = event.kind();

    let Some(payment) = event.payment().filter(|_| kind != WebhookKind::Ignored) else {
        tracing::debug!(event = %event.event, "Ignoring webhook event");
        return Ok(Json(json!({ "status": "ignored" })));
    };
    let Some(gateway_order_id) = payment.order_id.as_deref() else {
        tracing::warn!(event = %event.event, "Webhook payment has no order id");
        return Ok(Json(json!({ "status": "ignored" })));
    };

    let orders = OrderRepository::new(state.pool());
    let Some(order) = orders.get_by_gateway_order_id(gateway_order_id).await? else {
        tracing::warn!(gateway_order_id, "Webhook for unknown gateway order");
        return Ok(Json(json!({ "status": "ignored" })));
    };

    let update = match kind {
        WebhookKind::PaymentCaptured => {
            orders
                .change_status(order.id, |o| Ok(capture_change(o, &payment.id)))
                .await?
        }
        WebhookKind::PaymentFailed => {
            tracing::info!(
                reason = payment.error_description.as_deref().unwrap_or("unknown"),
                "Payment failed"
            );
            orders
                .change_status(order.id, |o| Ok(failure_change(o)))
                .await?
        }
        WebhookKind::Ignored => return Ok(Json(json!({ "status": "ignored" }))),
    };

    if newly_paid(&update) {
        notify_paid(&state, update.order.clone()).await;
    }

    tracing::info!(
        order_id = %update.order.id,
        payment_status = %update.order.payment_status,
        "Webhook processed"
    );
    Ok(Json(json!({ "status": "ok" })))
}

/// Confirmation email for an order paid via webhook (no request user at hand).
async fn notify_paid(state: &AppState, order: Order) {
    match UserRepository::new(state.pool()).get_by_id(order.user_id).await {
        Ok(Some(user)) => EmailService::notify(
            state.email(),
            Notification::OrderConfirmation {
                to: user.email,
                name: user.name,
                order,
            },
        ),
        Ok(None) => tracing::warn!(user_id = %order.user_id, "Paid order has no user"),
        Err(e) => tracing::warn!(error = %e, "Failed to load user for confirmation email"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use mindy_munchs_core::UserId;

    use super::*;
    use crate::models::ShippingAddress;

    fn order(status: OrderStatus, payment_status: PaymentStatus, method: PaymentMethod) -> Order {
        Order {
            id: OrderId::new(3),
            user_id: UserId::new(1),
            status,
            payment_status,
            payment_method: method,
            shipping_address: ShippingAddress {
                full_name: "Ravi M".to_string(),
                phone: "9123456780".to_string(),
                line1: "22 Temple St".to_string(),
                line2: None,
                city: "Chennai".to_string(),
                state: "Tamil Nadu".to_string(),
                pincode: "600001".to_string(),
            },
            subtotal: Decimal::new(600, 0),
            shipping_fee: Decimal::ZERO,
            total: Decimal::new(600, 0),
            gateway_order_id: Some("order_X".to_string()),
            gateway_payment_id: None,
            notes: None,
            items: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_ensure_payable() {
        use PaymentMethod::{Cod, Online};
        use PaymentStatus::{Failed, Paid, Pending};

        assert!(ensure_payable(&order(OrderStatus::Pending, Pending, Online)).is_ok());
        assert!(ensure_payable(&order(OrderStatus::Pending, Failed, Online)).is_ok());
        assert!(ensure_payable(&order(OrderStatus::Pending, Paid, Online)).is_err());
        assert!(ensure_payable(&order(OrderStatus::Pending, Pending, Cod)).is_err());
        assert!(ensure_payable(&order(OrderStatus::Cancelled, Pending, Online)).is_err());
    }

    #[test]
    fn test_capture_moves_pending_to_processing() {
        let change = capture_change(
            &order(OrderStatus::Pending, PaymentStatus::Pending, PaymentMethod::Online),
            "pay_1",
        );
        assert_eq!(change.status, Some(OrderStatus::Processing));
        assert_eq!(change.payment_status, Some(PaymentStatus::Paid));
        assert_eq!(change.gateway_payment_id.as_deref(), Some("pay_1"));
    }

    #[test]
    fn test_capture_is_idempotent() {
        let change = capture_change(
            &order(OrderStatus::Processing, PaymentStatus::Paid, PaymentMethod::Online),
            "pay_2",
        );
        assert_eq!(change, StatusChange::default());
    }

    #[test]
    fn test_failure_never_downgrades_paid() {
        let paid = order(OrderStatus::Processing, PaymentStatus::Paid, PaymentMethod::Online);
        assert_eq!(failure_change(&paid), StatusChange::default());

        let pending = order(OrderStatus::Pending, PaymentStatus::Pending, PaymentMethod::Online);
        assert_eq!(
            failure_change(&pending).payment_status,
            Some(PaymentStatus::Failed)
        );
    }
}
