//! Bearer token maintenance.

use mindy_munchs_api::db::TokenRepository;

/// Delete every expired bearer token.
///
/// The API server also does this hourly; this is for one-off cleanups.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the delete fails.
pub async fn purge() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;
    let removed = TokenRepository::new(&pool).purge_expired().await?;
    tracing::info!(removed, "Expired tokens purged");
    Ok(())
}
