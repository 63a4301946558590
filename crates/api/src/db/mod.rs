//! Database access for the store.
//!
//! # Schema: `shop`
//!
//! - `app_user` - Shopper and admin accounts (Argon2id password hashes)
//! - `auth_token` - Hashed bearer tokens with expiry
//! - `product` - Catalog (soft-deleted via `is_active`)
//! - `cart_item` - One row per (user, product)
//! - `customer_order` / `order_item` - Orders with name/price snapshots
//! - `guest` - Newsletter subscribers
//! - `testimonial` - Customer reviews awaiting or past moderation
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p mindy-munchs-cli -- migrate
//! ```

pub mod cart;
pub mod guests;
pub mod orders;
pub mod products;
pub mod stats;
pub mod testimonials;
pub mod tokens;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use cart::CartRepository;
pub use guests::GuestRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use stats::StatsRepository;
pub use testimonials::TestimonialRepository;
pub use tokens::TokenRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict(what)`; pass everything else through.
    pub(crate) fn from_unique(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(what.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Parse an email column, flagging bad rows as corruption.
pub(crate) fn parse_email(value: &str) -> Result<mindy_munchs_core::Email, RepositoryError> {
    mindy_munchs_core::Email::parse(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))
}
