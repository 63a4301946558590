//! Admin account commands.
//!
//! Creating an admin goes through the same validation and password hashing
//! as API registration, so it needs the full API configuration
//! (`API_TOKEN_SECRET` included).

use mindy_munchs_api::config::ApiConfig;
use mindy_munchs_api::db::UserRepository;
use mindy_munchs_api::services::auth::Registration;
use mindy_munchs_api::state::AppState;
use mindy_munchs_core::{Email, UserRole};

/// Create a new admin account.
///
/// # Errors
///
/// Returns an error if the input is invalid, the email is taken, or the
/// database is unreachable.
pub async fn create(
    email: &str,
    name: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ApiConfig::from_env()?;
    let pool = mindy_munchs_api::db::create_pool(&config.database_url).await?;
    let state = AppState::new(config, pool)?;

    let user = state
        .auth()
        .create_user(Registration {
            name,
            email,
            password,
            phone: None,
            role: UserRole::Admin,
        })
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "Admin account created");
    if state.config().super_admins.is_protected(user.email.as_str()) {
        tracing::info!("Account is a protected super-admin");
    }
    Ok(())
}

/// Promote an existing account to admin.
///
/// # Errors
///
/// Returns an error if no account has this email.
pub async fn promote(email: &str) -> Result<(), Box<dyn std::error::Error>> {
    let email = Email::parse(email)?;
    let pool = super::connect().await?;

    let user = UserRepository::new(&pool)
        .set_role_by_email(&email, UserRole::Admin)
        .await
        .map_err(|e| format!("Could not promote {email}: {e}"))?;

    tracing::info!(user_id = %user.id, email = %user.email, "Account promoted to admin");
    Ok(())
}
