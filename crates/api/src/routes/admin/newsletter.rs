//! Newsletter administration handlers.
//!
//! Broadcasts go out one recipient at a time so a single bad address only
//! counts as one failure.

use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use mindy_munchs_core::validation::require_length;

use crate::db::GuestRepository;
use crate::error::{AppError, Result};
use crate::extract::{Json, Query};
use crate::middleware::RequireAdmin;
use crate::models::{Guest, Page, Paginated};
use crate::state::AppState;

/// Subscriber list query string.
#[derive(Debug, Default, Deserialize)]
pub struct SubscriberQuery {
    pub subscribed: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Page of subscribers.
#[derive(Debug, Serialize)]
pub struct SubscriberList {
    pub subscribers: Vec<Guest>,
}

/// Broadcast request body.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub subject: String,
    pub body: String,
}

/// Delivery counts for a broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SendReport {
    pub sent: usize,
    pub failed: usize,
}

/// Subscribers, newest first.
///
/// GET /api/admin/newsletter/subscribers
pub async fn subscribers(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<SubscriberQuery>,
) -> Result<Json<Paginated<SubscriberList>>> {
    let page = Page::new(query.page, query.limit);
    let (subscribers, total) = GuestRepository::new(state.pool())
        .list(query.subscribed, page)
        .await?;
    Ok(Json(Paginated::new(SubscriberList { subscribers }, page, total)))
}

/// Email every subscribed guest.
///
/// POST /api/admin/newsletter/send
#[instrument(skip_all, fields(admin_id = %admin.user.id))]
pub async fn send(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<SendRequest>,
) -> Result<Json<SendReport>> {
    let subject = require_length("subject", &request.subject, 1, 200)?;
    let body = require_length("body", &request.body, 1, 20_000)?;

    let Some(email) = state.email() else {
        return Err(AppError::ServiceUnavailable(
            "Email delivery is not configured".into(),
        ));
    };

    let recipients = GuestRepository::new(state.pool()).all_subscribed().await?;
    let mut report = SendReport::default();

    for guest in &recipients {
        match email.send_newsletter(&guest.email, &subject, &body).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(guest_id = %guest.id, error = %e, "Newsletter delivery failed");
            }
        }
    }

    tracing::info!(sent = report.sent, failed = report.failed, "Newsletter sent");
    Ok(Json(report))
}
