//! Catalog route handlers.
//!
//! Reads are public and only ever show active products (admins may also
//! open inactive ones by id). Writes require an admin token.

use axum::{extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use mindy_munchs_core::ProductId;

use crate::db::{ProductRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::{OptionalAuth, RequireAdmin};
use crate::models::product::ProductPatch;
use crate::models::{CategoryCount, Page, Paginated, Product, ProductFilter, ProductInput, ProductSort};
use crate::state::AppState;

/// Catalog query string.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub featured: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: Option<ProductSort>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl From<ProductQuery> for ProductFilter {
    fn from(query: ProductQuery) -> Self {
        Self {
            category: query.category,
            search: query.search,
            featured: query.featured,
            min_price: query.min_price,
            max_price: query.max_price,
            sort: query.sort.unwrap_or_default(),
            page: Page::new(query.page, query.limit),
        }
    }
}

/// Product list payload inside the pagination envelope.
#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
}

/// List active products.
///
/// GET /api/products
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Paginated<ProductList>>> {
    if let (Some(min), Some(max)) = (query.min_price, query.max_price)
        && min > max
    {
        return Err(AppError::BadRequest(
            "min_price must not exceed max_price".into(),
        ));
    }

    let filter = ProductFilter::from(query);
    let (products, total) = ProductRepository::new(state.pool())
        .list_active(&filter)
        .await?;

    Ok(Json(Paginated::new(
        ProductList { products },
        filter.page,
        total,
    )))
}

/// Categories with active product counts.
///
/// GET /api/products/categories
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<CategoryCount>>> {
    let categories = ProductRepository::new(state.pool()).categories().await?;
    Ok(Json(categories))
}

/// A single product.
///
/// GET /api/products/{id}
#[instrument(skip(state, viewer))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let is_admin = viewer.is_some_and(|v| v.user.is_admin());

    let product = state
        .catalog()
        .product(state.pool(), id)
        .await?
        .filter(|p| p.is_active || is_admin)
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;

    Ok(Json(product))
}

/// Create a product.
///
/// POST /api/products
#[instrument(skip_all, fields(admin_id = %admin.user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    let input = body.validate()?;
    let product = ProductRepository::new(state.pool()).create(&input).await?;

    state.catalog().store_product(&product).await;
    tracing::info!(product_id = %product.id, name = %product.name, "Product created");

    Ok((StatusCode::CREATED, Json(product)))
}

/// Update a product; fields left out of the body keep their value.
///
/// PUT /api/products/{id}
#[instrument(skip_all, fields(admin_id = %admin.user.id, product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductPatch>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool())
        .edit(id, |existing| {
            body.apply(ProductInput::from(existing))
                .validate()
                .map_err(AppError::from)
        })
        .await
        .map_err(|e| match e {
            AppError::Database(RepositoryError::NotFound) => {
                AppError::NotFound("Product not found".into())
            }
            other => other,
        })?;

    state.catalog().store_product(&product).await;
    Ok(Json(product))
}

/// Soft-delete a product.
///
/// DELETE /api/products/{id}
#[instrument(skip_all, fields(admin_id = %admin.user.id, product_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool())
        .deactivate(id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Product not found".into()),
            other => other.into(),
        })?;

    state.catalog().invalidate_products(&[id]).await;
    tracing::info!("Product deactivated");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults() {
        let filter = ProductFilter::from(ProductQuery::default());
        assert_eq!(filter.sort, ProductSort::Newest);
        assert_eq!(filter.page, Page::new(Some(1), Some(12)));
    }

    #[test]
    fn test_query_clamps_limit() {
        let filter = ProductFilter::from(ProductQuery {
            limit: Some(500),
            page: Some(0),
            ..Default::default()
        });
        assert_eq!(filter.page.limit, 50);
        assert_eq!(filter.page.page, 1);
    }

    #[test]
    fn test_product_list_serializes_flat() {
        let body = Paginated::new(
            ProductList { products: vec![] },
            Page::default(),
            0,
        );
        let json = serde_json::to_value(body).unwrap();
        assert!(json["products"].is_array());
        assert_eq!(json["total_pages"], 0);
    }
}
