//! Public testimonial route handlers.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use mindy_munchs_core::validation::{require_length, require_range};

use crate::db::TestimonialRepository;
use crate::error::Result;
use crate::extract::Json;
use crate::middleware::RequireAuth;
use crate::models::Testimonial;
use crate::state::AppState;

/// New testimonial request body.
#[derive(Debug, Deserialize)]
pub struct CreateTestimonialRequest {
    /// Display name; defaults to the account name.
    #[serde(default)]
    pub name: Option<String>,
    pub content: String,
    pub rating: i32,
}

/// Validated testimonial fields.
#[derive(Debug, PartialEq, Eq)]
struct NewTestimonial {
    name: String,
    content: String,
    rating: i32,
}

impl CreateTestimonialRequest {
    fn validate(self, account_name: &str) -> Result<NewTestimonial> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| account_name.to_string());

        Ok(NewTestimonial {
            name: require_length("name", &name, 2, 50)?,
            content: require_length("content", &self.content, 10, 500)?,
            rating: require_range("rating", self.rating, 1, 5)?,
        })
    }
}

/// Approved testimonials, newest first.
///
/// GET /api/testimonials
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Testimonial>>> {
    let testimonials = TestimonialRepository::new(state.pool())
        .list(Some(true))
        .await?;
    Ok(Json(testimonials))
}

/// Submit a testimonial for moderation.
///
/// POST /api/testimonials
#[instrument(skip_all, fields(user_id = %current.user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(body): Json<CreateTestimonialRequest>,
) -> Result<(StatusCode, Json<Testimonial>)> {
    let new = body.validate(&current.user.name)?;

    let testimonial = TestimonialRepository::new(state.pool())
        .create(Some(current.user.id), &new.name, &new.content, new.rating)
        .await?;

    tracing::info!(testimonial_id = %testimonial.id, "Testimonial submitted");
    Ok((StatusCode::CREATED, Json(testimonial)))
}
