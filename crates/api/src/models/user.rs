//! User account domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mindy_munchs_core::admin::AdminEntry;
use mindy_munchs_core::{Email, UserId, UserRole};

/// A registered user. The password hash never leaves the repository.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether this account may use the admin API.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl AdminEntry for User {
    fn email(&self) -> &str {
        self.email.as_str()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// The user resolved from the request's bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// Hash of the presented token, so logout can revoke exactly this one.
    pub token_hash: String,
}

/// A user as shown in the admin listing.
#[derive(Debug, Clone, Serialize)]
pub struct AdminView {
    #[serde(flatten)]
    pub user: User,
    pub is_super_admin: bool,
}

impl AdminEntry for AdminView {
    fn email(&self) -> &str {
        self.user.email.as_str()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.user.created_at
    }
}
