//! Authentication service.
//!
//! Passwords are stored as Argon2id hashes. Sessions are opaque bearer
//! tokens: 32 random bytes, base64url-encoded for the client, and stored only
//! as `hex(sha256(pepper || token))` so a database leak exposes no usable
//! tokens.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use mindy_munchs_core::validation::{require_length, require_phone};
use mindy_munchs_core::{Email, UserId, UserRole};

use crate::db::{GuestRepository, RepositoryError, TokenRepository, UserRepository};
use crate::models::{CurrentUser, User};

/// How often the server sweeps expired bearer tokens.
pub const TOKEN_PURGE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (bounds hashing cost).
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Fields accepted at registration.
#[derive(Debug, Clone)]
pub struct Registration<'r> {
    pub name: &'r str,
    pub email: &'r str,
    pub password: &'r str,
    pub phone: Option<&'r str>,
    pub role: UserRole,
}

/// A freshly issued bearer token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The raw token, returned to the client once.
    pub token: String,
    /// What is stored server-side.
    pub token_hash: String,
}

/// Authentication service.
///
/// Handles registration, login, bearer token issue/verification and
/// password changes.
pub struct AuthService<'a> {
    pool: &'a PgPool,
    users: UserRepository<'a>,
    tokens: TokenRepository<'a>,
    token_secret: &'a SecretString,
    token_ttl_hours: i64,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, token_secret: &'a SecretString, token_ttl_hours: i64) -> Self {
        Self {
            pool,
            users: UserRepository::new(pool),
            tokens: TokenRepository::new(pool),
            token_secret,
            token_ttl_hours,
        }
    }

    /// Register a new account and issue a token for it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::Validation` if the name or phone is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        registration: Registration<'_>,
    ) -> Result<(User, IssuedToken), AuthError> {
        let user = self.create_user(registration).await?;

        // A prior newsletter signup with this address now belongs to the account.
        if let Err(e) = GuestRepository::new(self.pool)
            .link_user(&user.email, user.id)
            .await
        {
            tracing::warn!(error = %e, user_id = %user.id, "Failed to link newsletter subscriber");
        }

        let token = self.issue_token(user.id).await?;
        Ok((user, token))
    }

    /// Create an account without issuing a token (CLI admin creation).
    ///
    /// # Errors
    ///
    /// Same as [`AuthService::register`].
    pub async fn create_user(&self, registration: Registration<'_>) -> Result<User, AuthError> {
        let name = require_length("name", registration.name, 2, 50)?;
        let email = Email::parse(registration.email)?;
        let phone = registration
            .phone
            .filter(|p| !p.trim().is_empty())
            .map(|p| require_phone("phone", p))
            .transpose()?;
        validate_password(registration.password)?;

        let password_hash = hash_password(registration.password)?;

        self.users
            .create(&name, &email, phone.as_deref(), &password_hash, registration.role)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Check an email/password pair and issue a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, IssuedToken), AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_credentials(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        let token = self.issue_token(user.id).await?;
        Ok((user, token))
    }

    /// Resolve a raw bearer token to its user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is unknown or expired.
    pub async fn authenticate(&self, token: &str) -> Result<CurrentUser, AuthError> {
        let token_hash = hash_token(self.token_secret, token);

        let user_id = self
            .tokens
            .find_user_id(&token_hash)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        Ok(CurrentUser { user, token_hash })
    }

    /// Revoke the token behind the current request.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the delete fails.
    pub async fn logout(&self, current: &CurrentUser) -> Result<(), AuthError> {
        self.tokens.revoke(&current.token_hash).await?;
        Ok(())
    }

    /// Change the password and sign out every other session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the current password is wrong.
    /// Returns `AuthError::WeakPassword` if the new password is too weak.
    pub async fn change_password(
        &self,
        current: &CurrentUser,
        current_password: &str,
        new_password: &str,
    ) -> Result<u64, AuthError> {
        let stored = self.users.get_password_hash(current.user.id).await?;
        verify_password(current_password, &stored)?;
        validate_password(new_password)?;

        let password_hash = hash_password(new_password)?;
        self.users
            .update_password(current.user.id, &password_hash)
            .await?;

        let revoked = self
            .tokens
            .revoke_others(current.user.id, &current.token_hash)
            .await?;
        Ok(revoked)
    }

    async fn issue_token(&self, user_id: UserId) -> Result<IssuedToken, AuthError> {
        let token = generate_token();
        let token_hash = hash_token(self.token_secret, &token);
        let expires_at = Utc::now() + Duration::hours(self.token_ttl_hours);

        self.tokens.create(user_id, &token_hash, expires_at).await?;

        Ok(IssuedToken { token, token_hash })
    }
}

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Generate a new random bearer token (32 bytes, base64url without padding).
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Server-side token fingerprint: `hex(sha256(pepper || token))`.
#[must_use]
pub fn hash_token(secret: &SecretString, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.expose_secret().as_bytes());
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Delete expired bearer tokens every `every`, starting immediately.
///
/// The task runs until it is aborted or the runtime shuts down.
pub fn spawn_token_purge(pool: PgPool, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match TokenRepository::new(&pool).purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Purged expired tokens"),
                Err(e) => tracing::warn!(error = %e, "Failed to purge expired tokens"),
            }
        }
    })
}
