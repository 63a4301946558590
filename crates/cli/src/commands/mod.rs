//! Subcommand implementations.

pub mod admin;
pub mod migrate;
pub mod seed;
pub mod tokens;

use sqlx::PgPool;

use mindy_munchs_api::{config, db};

/// Connect to the database named by `API_DATABASE_URL`/`DATABASE_URL`.
pub async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    let database_url = config::database_url_from_env()?;
    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}
