//! Newsletter subscriber ("guest") domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mindy_munchs_core::{Email, GuestId, UserId};

/// A newsletter subscriber, optionally linked to a registered user.
#[derive(Debug, Clone, Serialize)]
pub struct Guest {
    pub id: GuestId,
    pub email: Email,
    pub name: Option<String>,
    pub is_subscribed: bool,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
