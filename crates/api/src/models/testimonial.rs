//! Customer testimonial domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mindy_munchs_core::{TestimonialId, UserId};

/// A customer review shown on the storefront once approved.
#[derive(Debug, Clone, Serialize)]
pub struct Testimonial {
    pub id: TestimonialId,
    pub user_id: Option<UserId>,
    pub name: String,
    pub content: String,
    pub rating: i32,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}
