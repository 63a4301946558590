//! Account route handlers: registration, login, logout and profile.

use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use mindy_munchs_core::UserRole;
use mindy_munchs_core::validation::{require_length, require_phone};

use crate::db::UserRepository;
use crate::error::Result;
use crate::extract::Json;
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::services::auth::{IssuedToken, Registration};
use crate::services::{EmailService, Notification};
use crate::state::AppState;

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Profile update; absent fields are left alone, an empty phone clears it.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// Password change request body.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Token plus the account it belongs to.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

impl AuthResponse {
    fn new(user: User, issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
            user,
        }
    }
}

/// Create an account.
///
/// POST /api/auth/register
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let (user, issued) = state
        .auth()
        .register(Registration {
            name: &body.name,
            email: &body.email,
            password: &body.password,
            phone: body.phone.as_deref(),
            role: UserRole::User,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    EmailService::notify(
        state.email(),
        Notification::Welcome {
            to: user.email.clone(),
            name: user.name.clone(),
        },
    );

    Ok((StatusCode::CREATED, Json(AuthResponse::new(user, issued))))
}

/// Exchange credentials for a bearer token.
///
/// POST /api/auth/login
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let (user, issued) = state.auth().login(&body.email, &body.password).await?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(AuthResponse::new(user, issued)))
}

/// Revoke the presented token.
///
/// POST /api/auth/logout
#[instrument(skip_all, fields(user_id = %current.user.id))]
pub async fn logout(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<StatusCode> {
    state.auth().logout(&current).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's account.
///
/// GET /api/auth/me
pub async fn me(RequireAuth(current): RequireAuth) -> Json<User> {
    Json(current.user)
}

/// Update name and/or phone.
///
/// PUT /api/auth/me
#[instrument(skip_all, fields(user_id = %current.user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    let user = current.user;

    let name = match body.name {
        Some(name) => require_length("name", &name, 2, 50)?,
        None => user.name,
    };
    let phone = match body.phone {
        Some(phone) if phone.trim().is_empty() => None,
        Some(phone) => Some(require_phone("phone", &phone)?),
        None => user.phone,
    };

    let updated = UserRepository::new(state.pool())
        .update_profile(user.id, &name, phone.as_deref())
        .await?;

    Ok(Json(updated))
}

/// Change the password; every other session is signed out.
///
/// PUT /api/auth/me/password
#[instrument(skip_all, fields(user_id = %current.user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode> {
    let revoked = state
        .auth()
        .change_password(&current, &body.current_password, &body.new_password)
        .await?;

    tracing::info!(revoked_sessions = revoked, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}
