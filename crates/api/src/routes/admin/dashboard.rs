//! Admin dashboard handler.

use axum::extract::State;

use crate::error::Result;
use crate::extract::Json;
use crate::middleware::RequireAdmin;
use crate::models::DashboardStats;
use crate::state::AppState;

/// Store-wide aggregates for the dashboard.
///
/// GET /api/admin/dashboard
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<DashboardStats>> {
    let stats = state.catalog().dashboard(state.pool()).await?;
    Ok(Json(stats))
}
