//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::{AuthService, CatalogCache, EmailService, PaymentError, PaymentGateway};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid SMTP configuration: {0}")]
    Email(#[from] lettre::transport::smtp::Error),
    #[error("invalid payment gateway configuration: {0}")]
    Payment(#[from] PaymentError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    email: Option<EmailService>,
    payments: Option<PaymentGateway>,
    catalog: CatalogCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Email and online payment are enabled only when configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay or gateway client cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, StateError> {
        let email = config
            .email
            .as_ref()
            .map(|email| EmailService::new(email, &config.frontend_url))
            .transpose()?;
        let payments = config
            .payment
            .as_ref()
            .map(PaymentGateway::new)
            .transpose()?;

        if email.is_none() {
            tracing::warn!("SMTP not configured, emails will be skipped");
        }
        if payments.is_none() {
            tracing::warn!("Payment gateway not configured, only cash on delivery is available");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                email,
                payments,
                catalog: CatalogCache::new(),
            }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// The email service, when SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }

    /// The payment gateway.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured` when online payment is disabled.
    pub fn payments(&self) -> Result<&PaymentGateway, PaymentError> {
        self.inner
            .payments
            .as_ref()
            .ok_or(PaymentError::NotConfigured)
    }

    /// Product and dashboard caches.
    #[must_use]
    pub fn catalog(&self) -> &CatalogCache {
        &self.inner.catalog
    }

    /// An authentication service bound to this state's pool and secret.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(
            &self.inner.pool,
            &self.inner.config.token_secret,
            self.inner.config.token_ttl_hours,
        )
    }
}
