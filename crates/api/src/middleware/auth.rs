//! Bearer-token authentication extractors.
//!
//! Handlers opt in by taking [`RequireAuth`], [`RequireAdmin`] or
//! [`OptionalAuth`]. The token is read from `Authorization: Bearer <token>`,
//! resolved once per request and kept in the request extensions so stacked
//! extractors don't hit the database twice.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};

use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::services::AuthError;
use crate::state::AppState;

/// Extractor that requires a valid bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(current): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", current.user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a valid bearer token belonging to an admin.
pub struct RequireAdmin(pub CurrentUser);

/// Extractor that resolves the caller if a valid token is presented.
///
/// Missing, malformed or expired tokens all yield `None`.
pub struct OptionalAuth(pub Option<CurrentUser>);

/// Why an authenticated extractor rejected the request.
#[derive(Debug)]
pub enum AuthRejection {
    /// No `Authorization` header, or not a bearer token.
    MissingToken,
    /// Token unknown, revoked or expired.
    InvalidToken,
    /// Authenticated, but not an admin.
    NotAdmin,
    /// Lookup failed.
    Failed(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::MissingToken => {
                AppError::Unauthorized("Authentication required".into()).into_response()
            }
            Self::InvalidToken => AppError::Auth(AuthError::InvalidToken).into_response(),
            Self::NotAdmin => AppError::Forbidden("Admin access required".into()).into_response(),
            Self::Failed(err) => err.into_response(),
        }
    }
}

/// The raw bearer token from the `Authorization` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

async fn resolve(parts: &mut Parts, state: &AppState) -> Result<CurrentUser, AuthRejection> {
    if let Some(current) = parts.extensions.get::<CurrentUser>() {
        return Ok(current.clone());
    }

    let token = bearer_token(parts).ok_or(AuthRejection::MissingToken)?;

    let current = state
        .auth()
        .authenticate(token)
        .await
        .map_err(|e| match e {
            AuthError::InvalidToken => AuthRejection::InvalidToken,
            other => AuthRejection::Failed(AppError::Auth(other)),
        })?;

    tracing::Span::current().record("user_id", current.user.id.as_i32());
    set_sentry_user(&current.user.id, Some(current.user.email.as_str()));

    parts.extensions.insert(current.clone());
    Ok(current)
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve(parts, state).await.map(Self)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = resolve(parts, state).await?;
        if !current.user.is_admin() {
            tracing::debug!(user_id = %current.user.id, "Non-admin rejected from admin route");
            return Err(AuthRejection::NotAdmin);
        }
        Ok(Self(current))
    }
}

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if bearer_token(parts).is_none() {
            return Ok(Self(None));
        }
        Ok(Self(resolve(parts, state).await.ok()))
    }
}
