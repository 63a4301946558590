//! Testimonial repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use mindy_munchs_core::{TestimonialId, UserId};

use super::RepositoryError;
use crate::models::Testimonial;

const TESTIMONIAL_COLUMNS: &str = "id, user_id, name, content, rating, is_approved, created_at";

#[derive(Debug, sqlx::FromRow)]
struct TestimonialRow {
    id: i32,
    user_id: Option<i32>,
    name: String,
    content: String,
    rating: i32,
    is_approved: bool,
    created_at: DateTime<Utc>,
}

impl From<TestimonialRow> for Testimonial {
    fn from(row: TestimonialRow) -> Self {
        Self {
            id: TestimonialId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            name: row.name,
            content: row.content,
            rating: row.rating,
            is_approved: row.is_approved,
            created_at: row.created_at,
        }
    }
}

/// Repository for testimonials.
pub struct TestimonialRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TestimonialRepository<'a> {
    /// Create a new testimonial repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Testimonials, newest first. `approved` filters by moderation state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, approved: Option<bool>) -> Result<Vec<Testimonial>, RepositoryError> {
        let rows = sqlx::query_as::<_, TestimonialRow>(&format!(
            r"
            SELECT {TESTIMONIAL_COLUMNS} FROM shop.testimonial
            WHERE ($1::boolean IS NULL OR is_approved = $1)
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(approved)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Store a new, unapproved testimonial.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: Option<UserId>,
        name: &str,
        content: &str,
        rating: i32,
    ) -> Result<Testimonial, RepositoryError> {
        let row = sqlx::query_as::<_, TestimonialRow>(&format!(
            r"
            INSERT INTO shop.testimonial (user_id, name, content, rating)
            VALUES ($1, $2, $3, $4)
            RETURNING {TESTIMONIAL_COLUMNS}
            "
        ))
        .bind(user_id.map(|id| id.as_i32()))
        .bind(name)
        .bind(content)
        .bind(rating)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Approve or hide a testimonial.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the testimonial does not exist.
    pub async fn set_approved(
        &self,
        id: TestimonialId,
        approved: bool,
    ) -> Result<Testimonial, RepositoryError> {
        let row = sqlx::query_as::<_, TestimonialRow>(&format!(
            r"
            UPDATE shop.testimonial SET is_approved = $2
            WHERE id = $1
            RETURNING {TESTIMONIAL_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(approved)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a testimonial.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the testimonial does not exist.
    pub async fn delete(&self, id: TestimonialId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.testimonial WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
