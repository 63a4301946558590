//! Newsletter subscriber repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use mindy_munchs_core::{Email, GuestId, UserId};

use super::{RepositoryError, parse_email};
use crate::models::{Guest, Page};

const GUEST_COLUMNS: &str = "id, email, name, is_subscribed, user_id, created_at, updated_at";

/// How a subscribe request changed the subscriber list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// First time this address subscribed.
    Created,
    /// A previously unsubscribed address opted back in.
    Reactivated,
    /// Nothing changed.
    AlreadySubscribed,
}

impl SubscribeOutcome {
    /// Classify an upsert. `was_subscribed` is the row's state before the
    /// statement, `None` when this statement could not see it (a concurrent
    /// subscribe created it first).
    const fn of(inserted: bool, was_subscribed: Option<bool>) -> Self {
        match (inserted, was_subscribed) {
            (true, _) => Self::Created,
            (false, Some(false)) => Self::Reactivated,
            (false, _) => Self::AlreadySubscribed,
        }
    }

    /// Whether the subscriber should get a welcome email.
    #[must_use]
    pub const fn is_new(self) -> bool {
        matches!(self, Self::Created | Self::Reactivated)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GuestRow {
    id: i32,
    email: String,
    name: Option<String>,
    is_subscribed: bool,
    user_id: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SubscribeRow {
    #[sqlx(flatten)]
    guest: GuestRow,
    inserted: bool,
    was_subscribed: Option<bool>,
}

impl TryFrom<GuestRow> for Guest {
    type Error = RepositoryError;

    fn try_from(row: GuestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: GuestId::new(row.id),
            email: parse_email(&row.email)?,
            name: row.name,
            is_subscribed: row.is_subscribed,
            user_id: row.user_id.map(UserId::new),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for newsletter subscribers.
pub struct GuestRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GuestRepository<'a> {
    /// Create a new guest repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Subscribe an address, creating or reactivating it as needed.
    ///
    /// The subscriber is linked to a registered user with the same email.
    /// Concurrent subscribes for one address settle on a single row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn subscribe(
        &self,
        email: &Email,
        name: Option<&str>,
    ) -> Result<(Guest, SubscribeOutcome), RepositoryError> {
        let row = sqlx::query_as::<_, SubscribeRow>(&format!(
            r"
            WITH previous AS (
                SELECT is_subscribed FROM shop.guest WHERE email = $1
            )
            INSERT INTO shop.guest AS g (email, name, user_id)
            VALUES ($1, $2, (SELECT id FROM shop.app_user WHERE email = $1))
            ON CONFLICT (email) DO UPDATE
            SET is_subscribed = TRUE,
                name = CASE WHEN g.is_subscribed THEN g.name
                            ELSE COALESCE(EXCLUDED.name, g.name) END,
                user_id = COALESCE(g.user_id, EXCLUDED.user_id),
                updated_at = CASE WHEN g.is_subscribed THEN g.updated_at ELSE NOW() END
            RETURNING {GUEST_COLUMNS},
                (xmax = 0) AS inserted,
                (SELECT is_subscribed FROM previous) AS was_subscribed
            "
        ))
        .bind(email.as_str())
        .bind(name)
        .fetch_one(self.pool)
        .await?;

        let outcome = SubscribeOutcome::of(row.inserted, row.was_subscribed);
        Ok((row.guest.try_into()?, outcome))
    }

    /// Unsubscribe an address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address never subscribed.
    pub async fn unsubscribe(&self, email: &Email) -> Result<Guest, RepositoryError> {
        let row = sqlx::query_as::<_, GuestRow>(&format!(
            r"
            UPDATE shop.guest SET is_subscribed = FALSE, updated_at = NOW()
            WHERE email = $1
            RETURNING {GUEST_COLUMNS}
            "
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Attach an existing subscriber to a newly registered user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn link_user(&self, email: &Email, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE shop.guest SET user_id = $2, updated_at = NOW() WHERE email = $1 AND user_id IS NULL",
        )
        .bind(email.as_str())
        .bind(user_id.as_i32())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Subscribers for the admin list, newest first, with the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        subscribed: Option<bool>,
        page: Page,
    ) -> Result<(Vec<Guest>, i64), RepositoryError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM shop.guest WHERE ($1::boolean IS NULL OR is_subscribed = $1)",
        )
        .bind(subscribed)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, GuestRow>(&format!(
            r"
            SELECT {GUEST_COLUMNS} FROM shop.guest
            WHERE ($1::boolean IS NULL OR is_subscribed = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(subscribed)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let guests = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((guests, total))
    }

    /// Every currently subscribed guest, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn all_subscribed(&self) -> Result<Vec<Guest>, RepositoryError> {
        let rows = sqlx::query_as::<_, GuestRow>(&format!(
            "SELECT {GUEST_COLUMNS} FROM shop.guest WHERE is_subscribed ORDER BY id"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
