//! Inventory management handlers.

use axum::extract::State;
use serde::Deserialize;
use tracing::instrument;

use mindy_munchs_core::validation::require_range;
use mindy_munchs_core::{ProductId, StockLevel};

use crate::db::{ProductRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAdmin;
use crate::models::{Product, StockSummary};
use crate::state::AppState;

/// Inventory list query string.
#[derive(Debug, Default, Deserialize)]
pub struct InventoryQuery {
    pub level: Option<StockLevel>,
}

/// Stock update request body.
#[derive(Debug, Deserialize)]
pub struct UpdateStockRequest {
    pub stock: i32,
}

/// Every product, active or not, lowest stock first.
///
/// GET /api/admin/inventory
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<InventoryQuery>,
) -> Result<Json<Vec<Product>>> {
    let products = ProductRepository::new(state.pool())
        .list_inventory(query.level)
        .await?;
    Ok(Json(products))
}

/// Product counts per stock bucket.
///
/// GET /api/admin/inventory/summary
pub async fn summary(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<StockSummary>> {
    let summary = ProductRepository::new(state.pool()).stock_summary().await?;
    Ok(Json(summary))
}

/// Set a product's stock count.
///
/// PATCH /api/admin/inventory/{id}
#[instrument(skip_all, fields(admin_id = %admin.user.id, product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<UpdateStockRequest>,
) -> Result<Json<Product>> {
    let stock = require_range("stock", body.stock, 0, i32::MAX)?;

    let product = ProductRepository::new(state.pool())
        .set_stock(id, stock)
        .await
        .map_err(|err| match err {
            RepositoryError::NotFound => AppError::NotFound("Product not found".into()),
            other => other.into(),
        })?;

    state.catalog().store_product(&product).await;
    tracing::info!(stock, level = product.stock_level.as_str(), "Stock updated");

    Ok(Json(product))
}
