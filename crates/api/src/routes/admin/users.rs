//! Admin user management handlers.
//!
//! Accounts listed in `SUPER_ADMIN_EMAILS` are protected: they cannot be
//! demoted or deleted through the API. Admins also cannot demote or delete
//! themselves.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use mindy_munchs_core::{SuperAdminList, UserId, UserRole};

use crate::db::{RepositoryError, UserRepository};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAdmin;
use crate::models::{AdminView, User};
use crate::state::AppState;

/// User list query string.
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<UserRole>,
}

/// Account-changing actions that protected and self accounts are shielded from.
#[derive(Debug, Clone, Copy)]
enum Removal {
    Demote,
    Delete,
}

/// Refuse to demote or delete a super-admin, or the acting admin.
fn check_removal(
    super_admins: &SuperAdminList,
    actor: &User,
    target: &User,
    action: Removal,
) -> Result<()> {
    if super_admins.is_protected(target.email.as_str()) {
        return Err(AppError::Forbidden(match action {
            Removal::Demote => "Super admins cannot be demoted".into(),
            Removal::Delete => "Super admins cannot be deleted".into(),
        }));
    }
    if actor.id == target.id {
        return Err(AppError::BadRequest(match action {
            Removal::Demote => "You cannot demote yourself".into(),
            Removal::Delete => "You cannot delete your own account".into(),
        }));
    }
    Ok(())
}

/// Admins first in super-admin order, then everyone else newest first.
fn order_users(super_admins: &SuperAdminList, users: Vec<User>) -> Vec<User> {
    let (mut admins, shoppers): (Vec<_>, Vec<_>) = users.into_iter().partition(User::is_admin);
    super_admins.sort(&mut admins);
    admins.extend(shoppers);
    admins
}

fn user_not_found(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound("User not found".into()),
        other => other.into(),
    }
}

async fn load_user(state: &AppState, id: UserId) -> Result<User> {
    UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// All accounts, optionally filtered by role.
///
/// GET /api/admin/users
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<User>>> {
    let users = UserRepository::new(state.pool()).list(query.role).await?;
    Ok(Json(order_users(&state.config().super_admins, users)))
}

/// Admin accounts, super-admins first.
///
/// GET /api/admin/admins
pub async fn admins(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<AdminView>>> {
    let super_admins = &state.config().super_admins;
    let mut admins: Vec<AdminView> = UserRepository::new(state.pool())
        .list(Some(UserRole::Admin))
        .await?
        .into_iter()
        .map(|user| AdminView {
            is_super_admin: super_admins.is_protected(user.email.as_str()),
            user,
        })
        .collect();
    super_admins.sort(&mut admins);
    Ok(Json(admins))
}

/// Grant the admin role.
///
/// PATCH /api/admin/users/{id}/promote
#[instrument(skip_all, fields(admin_id = %admin.user.id, target_id = %id))]
pub async fn promote(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<User>> {
    let user = UserRepository::new(state.pool())
        .set_role(id, UserRole::Admin)
        .await
        .map_err(user_not_found)?;

    tracing::info!(email = %user.email, "User promoted to admin");
    Ok(Json(user))
}

/// Revoke the admin role.
///
/// PATCH /api/admin/users/{id}/demote
#[instrument(skip_all, fields(admin_id = %admin.user.id, target_id = %id))]
pub async fn demote(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<User>> {
    let target = load_user(&state, id).await?;
    check_removal(
        &state.config().super_admins,
        &admin.user,
        &target,
        Removal::Demote,
    )?;

    let user = UserRepository::new(state.pool())
        .set_role(id, UserRole::User)
        .await
        .map_err(user_not_found)?;

    tracing::info!(email = %user.email, "Admin demoted to user");
    Ok(Json(user))
}

/// Delete an account that has never placed an order.
///
/// DELETE /api/admin/users/{id}
#[instrument(skip_all, fields(admin_id = %admin.user.id, target_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<StatusCode> {
    let target = load_user(&state, id).await?;
    check_removal(
        &state.config().super_admins,
        &admin.user,
        &target,
        Removal::Delete,
    )?;

    UserRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(user_not_found)?;

    tracing::info!(email = %target.email, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};

    use mindy_munchs_core::Email;

    use super::*;

    fn user(id: i32, email: &str, role: UserRole, day: u32) -> User {
        let at = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
        User {
            id: UserId::new(id),
            name: format!("User {id}"),
            email: Email::parse(email).unwrap(),
            phone: None,
            role,
            created_at: at,
            updated_at: at,
        }
    }

    fn owners() -> SuperAdminList {
        SuperAdminList::new(["owner@mindymunchs.com"])
    }

    #[test]
    fn test_protected_accounts_are_forbidden() {
        let actor = user(1, "ops@mindymunchs.com", UserRole::Admin, 1);
        let owner = user(2, "Owner+shop@mindymunchs.com", UserRole::Admin, 2);

        for action in [Removal::Demote, Removal::Delete] {
            let err = check_removal(&owners(), &actor, &owner, action).unwrap_err();
            assert!(matches!(err, AppError::Forbidden(_)));
        }
    }

    #[test]
    fn test_self_removal_is_bad_request() {
        let actor = user(1, "ops@mindymunchs.com", UserRole::Admin, 1);

        let err = check_removal(&owners(), &actor, &actor, Removal::Demote).unwrap_err();
        assert_eq!(err.to_string(), "Bad request: You cannot demote yourself");

        let err = check_removal(&owners(), &actor, &actor, Removal::Delete).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_other_admins_can_be_removed() {
        let actor = user(1, "ops@mindymunchs.com", UserRole::Admin, 1);
        let other = user(3, "packing@mindymunchs.com", UserRole::Admin, 3);
        assert!(check_removal(&owners(), &actor, &other, Removal::Demote).is_ok());
    }

    #[test]
    fn test_order_users_puts_admins_first() {
        // Repository order: newest first.
        let users = vec![
            user(4, "shopper2@example.com", UserRole::User, 9),
            user(3, "ops@mindymunchs.com", UserRole::Admin, 8),
            user(2, "shopper1@example.com", UserRole::User, 5),
            user(1, "owner@mindymunchs.com", UserRole::Admin, 1),
        ];

        let ordered: Vec<i32> = order_users(&owners(), users)
            .iter()
            .map(|u| u.id.as_i32())
            .collect();
        assert_eq!(ordered, vec![1, 3, 4, 2]);
    }
}
