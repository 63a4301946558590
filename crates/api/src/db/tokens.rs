//! Bearer token repository.
//!
//! Only hashes are stored; the raw token is shown to the client once.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use mindy_munchs_core::UserId;

use super::RepositoryError;

/// Repository for bearer token storage.
pub struct TokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TokenRepository<'a> {
    /// Create a new token repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a token hash for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO shop.auth_token (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id.as_i32())
        .bind(token_hash)
        .bind(expires_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Resolve an unexpired token hash to its user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_user_id(&self, token_hash: &str) -> Result<Option<UserId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, i32>(
            "SELECT user_id FROM shop.auth_token WHERE token_hash = $1 AND expires_at > NOW()",
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(id.map(UserId::new))
    }

    /// Revoke a single token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn revoke(&self, token_hash: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.auth_token WHERE token_hash = $1")
            .bind(token_hash)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Revoke every token of a user except `keep_hash`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn revoke_others(
        &self,
        user_id: UserId,
        keep_hash: &str,
    ) -> Result<u64, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shop.auth_token WHERE user_id = $1 AND token_hash <> $2")
                .bind(user_id.as_i32())
                .bind(keep_hash)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Remove expired tokens.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.auth_token WHERE expires_at <= NOW()")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
