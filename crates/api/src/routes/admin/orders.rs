//! Admin order management handlers.

use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use mindy_munchs_core::{OrderId, OrderStatus, PaymentStatus};

use crate::db::orders::{OrderListFilter, StatusChange, StatusUpdate};
use crate::db::{OrderRepository, RepositoryError, UserRepository};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAdmin;
use crate::models::{Order, Page, Paginated};
use crate::services::{EmailService, Notification};
use crate::state::AppState;

/// Order list query string.
#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl From<OrderQuery> for OrderListFilter {
    fn from(query: OrderQuery) -> Self {
        Self {
            status: query.status,
            payment_status: query.payment_status,
            page: Page::new(query.page, query.limit),
        }
    }
}

/// Order status update request body.
#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

impl UpdateOrderRequest {
    fn into_change(self) -> Result<StatusChange> {
        if self.status.is_none() && self.payment_status.is_none() {
            return Err(AppError::BadRequest(
                "Provide status or payment_status".into(),
            ));
        }
        Ok(StatusChange {
            status: self.status,
            payment_status: self.payment_status,
            gateway_payment_id: None,
        })
    }
}

/// Page of orders.
#[derive(Debug, Serialize)]
pub struct OrderList {
    pub orders: Vec<Order>,
}

/// All orders, newest first.
///
/// GET /api/admin/orders
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Paginated<OrderList>>> {
    let filter = OrderListFilter::from(query);
    let (orders, total) = OrderRepository::new(state.pool()).list(&filter).await?;
    Ok(Json(Paginated::new(OrderList { orders }, filter.page, total)))
}

/// Move an order to a new status and/or payment status.
///
/// PATCH /api/admin/orders/{id}
#[instrument(skip_all, fields(admin_id = %admin.user.id, order_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<UpdateOrderRequest>,
) -> Result<Json<Order>> {
    let change = body.into_change()?;

    let update = OrderRepository::new(state.pool())
        .change_status(id, |_| Ok(change))
        .await
        .map_err(|err| match err {
            RepositoryError::NotFound => AppError::NotFound("Order not found".into()),
            other => other.into(),
        })?;

    if update.restocked {
        state
            .catalog()
            .invalidate_products(&update.order.product_ids())
            .await;
    }

    tracing::info!(
        from = %update.previous_status,
        to = %update.order.status,
        payment_from = %update.previous_payment_status,
        payment_to = %update.order.payment_status,
        "Order updated by admin"
    );

    if update.status_changed() {
        notify_status(&state, &update).await;
    }

    Ok(Json(update.order))
}

async fn notify_status(state: &AppState, update: &StatusUpdate) {
    let order = &update.order;
    match UserRepository::new(state.pool()).get_by_id(order.user_id).await {
        Ok(Some(user)) => EmailService::notify(
            state.email(),
            Notification::OrderStatus {
                to: user.email,
                name: user.name,
                order: order.clone(),
            },
        ),
        Ok(None) => tracing::warn!(user_id = %order.user_id, "Order has no user"),
        Err(e) => tracing::warn!(error = %e, "Failed to load user for status email"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_update_is_rejected() {
        let body = UpdateOrderRequest {
            status: None,
            payment_status: None,
        };
        assert!(matches!(body.into_change(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_update_body_parses_allowed_values() {
        let body: UpdateOrderRequest = serde_json::from_str(r#"{"status":"shipped"}"#).unwrap();
        let change = body.into_change().unwrap();
        assert_eq!(change.status, Some(OrderStatus::Shipped));
        assert_eq!(change.payment_status, None);

        let body: UpdateOrderRequest =
            serde_json::from_str(r#"{"payment_status":"refunded"}"#).unwrap();
        assert_eq!(
            body.into_change().unwrap().payment_status,
            Some(PaymentStatus::Refunded)
        );
    }

    #[test]
    fn test_update_body_rejects_unknown_status() {
        assert!(serde_json::from_str::<UpdateOrderRequest>(r#"{"status":"lost"}"#).is_err());
    }

    #[test]
    fn test_query_builds_filter() {
        let filter = OrderListFilter::from(OrderQuery {
            status: Some(OrderStatus::Pending),
            payment_status: None,
            page: Some(2),
            limit: Some(500),
        });
        assert_eq!(filter.status, Some(OrderStatus::Pending));
        assert_eq!(filter.page, Page { page: 2, limit: 50 });
    }
}
