//! Cart repository.
//!
//! Lines hold only (user, product, quantity); names and prices are joined
//! from the live catalog on every read.

use rust_decimal::Decimal;
use sqlx::PgPool;

use mindy_munchs_core::{ProductId, UserId};

use super::RepositoryError;
use crate::models::CartLine;

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    product_id: i32,
    name: String,
    price: Decimal,
    image_urls: Vec<String>,
    quantity: i32,
    stock: i32,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            product_id: ProductId::new(row.product_id),
            line_total: row.price * Decimal::from(row.quantity),
            name: row.name,
            price: row.price,
            image_url: row.image_urls.into_iter().next(),
            quantity: row.quantity,
            stock: row.stock,
        }
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's cart lines for active products, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT c.product_id, p.name, p.price, p.image_urls, c.quantity, p.stock
            FROM shop.cart_item c
            JOIN shop.product p ON p.id = c.product_id
            WHERE c.user_id = $1 AND p.is_active
            ORDER BY c.created_at, c.id
            ",
        )
        .bind(user_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Quantity of a product already in the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<i32>, RepositoryError> {
        let quantity = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM shop.cart_item WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id.as_i32())
        .bind(product_id.as_i32())
        .fetch_optional(self.pool)
        .await?;
        Ok(quantity)
    }

    /// Set the quantity of a line, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.cart_item (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
            ",
        )
        .bind(user_id.as_i32())
        .bind(product_id.as_i32())
        .bind(quantity)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the cart.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shop.cart_item WHERE user_id = $1 AND product_id = $2")
                .bind(user_id.as_i32())
                .bind(product_id.as_i32())
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.cart_item WHERE user_id = $1")
            .bind(user_id.as_i32())
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
