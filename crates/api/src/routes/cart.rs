//! Cart route handlers. Every route requires a bearer token.
//!
//! Each mutation responds with the full recomputed cart so the client never
//! has to total it locally.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use mindy_munchs_core::{ProductId, UserId};

use crate::db::{CartRepository, ProductRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path};
use crate::middleware::RequireAuth;
use crate::models::cart::MAX_LINE_QUANTITY;
use crate::models::{Cart, Product};
use crate::state::AppState;

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

/// Set-quantity request body.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

/// Check a desired line quantity against the per-line cap and stock.
fn check_quantity(product: &Product, quantity: i32) -> Result<i32> {
    if quantity < 1 {
        return Err(AppError::BadRequest("Quantity must be at least 1".into()));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "You can add at most {MAX_LINE_QUANTITY} of an item"
        )));
    }
    if quantity > product.stock {
        return Err(AppError::BadRequest(if product.stock <= 0 {
            format!("{} is out of stock", product.name)
        } else {
            format!("Only {} of {} left in stock", product.stock, product.name)
        }));
    }
    Ok(quantity)
}

async fn active_product(state: &AppState, id: ProductId) -> Result<Product> {
    ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".into()))
}

async fn load_cart(state: &AppState, user_id: UserId) -> Result<Cart> {
    let lines = CartRepository::new(state.pool()).lines(user_id).await?;
    Ok(Cart::from_lines(lines))
}

/// The caller's cart.
///
/// GET /api/cart
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<Cart>> {
    Ok(Json(load_cart(&state, current.user.id).await?))
}

/// Add units of a product, on top of what is already in the cart.
///
/// POST /api/cart/items
#[instrument(skip_all, fields(user_id = %current.user.id, product_id = %body.product_id))]
pub async fn add_item(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<Cart>> {
    if body.quantity < 1 {
        return Err(AppError::BadRequest("Quantity must be at least 1".into()));
    }

    let user_id = current.user.id;
    let product = active_product(&state, body.product_id).await?;
    let carts = CartRepository::new(state.pool());

    let existing = carts.quantity(user_id, product.id).await?.unwrap_or(0);
    let quantity = check_quantity(&product, existing.saturating_add(body.quantity))?;
    carts.set_quantity(user_id, product.id, quantity).await?;

    Ok(Json(load_cart(&state, user_id).await?))
}

/// Set a line's quantity; zero removes the line.
///
/// PUT /api/cart/items/{product_id}
#[instrument(skip_all, fields(user_id = %current.user.id, product_id = %product_id))]
pub async fn update_item(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(product_id): Path<ProductId>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<Cart>> {
    let user_id = current.user.id;
    let carts = CartRepository::new(state.pool());

    if body.quantity == 0 {
        carts
            .remove(user_id, product_id)
            .await
            .map_err(not_in_cart)?;
    } else {
        let product = active_product(&state, product_id).await?;
        let quantity = check_quantity(&product, body.quantity)?;
        carts.set_quantity(user_id, product_id, quantity).await?;
    }

    Ok(Json(load_cart(&state, user_id).await?))
}

/// Remove a line.
///
/// DELETE /api/cart/items/{product_id}
#[instrument(skip_all, fields(user_id = %current.user.id, product_id = %product_id))]
pub async fn remove_item(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Cart>> {
    CartRepository::new(state.pool())
        .remove(current.user.id, product_id)
        .await
        .map_err(not_in_cart)?;

    Ok(Json(load_cart(&state, current.user.id).await?))
}

/// Empty the cart.
///
/// DELETE /api/cart
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<StatusCode> {
    CartRepository::new(state.pool())
        .clear(current.user.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn not_in_cart(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound("Item not in cart".into()),
        other => other.into(),
    }
}
