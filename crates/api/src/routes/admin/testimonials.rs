//! Testimonial moderation handlers.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use mindy_munchs_core::TestimonialId;

use crate::db::{RepositoryError, TestimonialRepository};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAdmin;
use crate::models::Testimonial;
use crate::state::AppState;

/// Moderation list query string.
#[derive(Debug, Default, Deserialize)]
pub struct TestimonialQuery {
    pub approved: Option<bool>,
}

/// Moderation request body.
#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub is_approved: bool,
}

fn testimonial_not_found(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound("Testimonial not found".into()),
        other => other.into(),
    }
}

/// Every testimonial, approved or not.
///
/// GET /api/admin/testimonials
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<TestimonialQuery>,
) -> Result<Json<Vec<Testimonial>>> {
    let testimonials = TestimonialRepository::new(state.pool())
        .list(query.approved)
        .await?;
    Ok(Json(testimonials))
}

/// Approve or hide a testimonial.
///
/// PATCH /api/admin/testimonials/{id}
#[instrument(skip_all, fields(admin_id = %admin.user.id, testimonial_id = %id))]
pub async fn moderate(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<TestimonialId>,
    Json(body): Json<ModerateRequest>,
) -> Result<Json<Testimonial>> {
    let testimonial = TestimonialRepository::new(state.pool())
        .set_approved(id, body.is_approved)
        .await
        .map_err(testimonial_not_found)?;

    tracing::info!(is_approved = body.is_approved, "Testimonial moderated");
    Ok(Json(testimonial))
}

/// DELETE /api/admin/testimonials/{id}
#[instrument(skip_all, fields(admin_id = %admin.user.id, testimonial_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<TestimonialId>,
) -> Result<StatusCode> {
    TestimonialRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(testimonial_not_found)?;

    tracing::info!("Testimonial deleted");
    Ok(StatusCode::NO_CONTENT)
}
