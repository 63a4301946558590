//! Newsletter subscription route handlers.
//!
//! Subscribing is idempotent: repeating it for an already-subscribed address
//! succeeds without sending another welcome email.

use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use mindy_munchs_core::Email;
use mindy_munchs_core::validation::optional_length;

use crate::db::{GuestRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::extract::Json;
use crate::services::{EmailService, Notification};
use crate::state::AppState;

/// Subscribe request body.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Unsubscribe request body.
#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub email: String,
}

/// Current subscription state for an address.
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub email: Email,
    pub subscribed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_subscribed: Option<bool>,
}

fn parse_subscriber_email(raw: &str) -> Result<Email> {
    Email::parse(raw).map_err(|_| AppError::BadRequest("Invalid email address".into()))
}

/// Subscribe (or re-subscribe) an address.
///
/// POST /api/newsletter/subscribe
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(body): Json<SubscribeRequest>,
) -> Result<Json<SubscriptionResponse>> {
    let email = parse_subscriber_email(&body.email)?;
    let name = optional_length("name", body.name.as_deref(), 50)?;

    let (guest, outcome) = GuestRepository::new(state.pool())
        .subscribe(&email, name.as_deref())
        .await?;

    if outcome.is_new() {
        tracing::info!(guest_id = %guest.id, ?outcome, "Newsletter subscription");
        EmailService::notify(
            state.email(),
            Notification::NewsletterWelcome {
                to: guest.email.clone(),
                name: guest.name.clone(),
            },
        );
    }

    Ok(Json(SubscriptionResponse {
        email: guest.email,
        subscribed: true,
        already_subscribed: Some(!outcome.is_new()),
    }))
}

/// Unsubscribe an address.
///
/// POST /api/newsletter/unsubscribe
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(body): Json<UnsubscribeRequest>,
) -> Result<Json<SubscriptionResponse>> {
    let email = parse_subscriber_email(&body.email)?;

    let guest = GuestRepository::new(state.pool())
        .unsubscribe(&email)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Subscriber not found".into()),
            other => other.into(),
        })?;

    tracing::info!(guest_id = %guest.id, "Newsletter unsubscribe");

    Ok(Json(SubscriptionResponse {
        email: guest.email,
        subscribed: false,
        already_subscribed: None,
    }))
}
