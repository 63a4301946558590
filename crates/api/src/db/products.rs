//! Product repository for catalog and inventory queries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use mindy_munchs_core::{ProductId, StockLevel};

use super::RepositoryError;
use crate::models::{CategoryCount, Product, ProductFilter, ProductInput, StockSummary};

const PRODUCT_COLUMNS: &str = "id, name, description, price, compare_at_price, category, stock, \
     image_urls, is_featured, is_active, created_at, updated_at";

/// Catalog filter shared by the list and count queries.
///
/// `$1` category, `$2` search pattern, `$3` featured, `$4` min price, `$5` max price.
const CATALOG_FILTER: &str = r"
    is_active
    AND ($1::text IS NULL OR lower(category) = lower($1))
    AND ($2::text IS NULL OR name ILIKE $2 OR description ILIKE $2)
    AND ($3::boolean IS NULL OR is_featured = $3)
    AND ($4::numeric IS NULL OR price >= $4)
    AND ($5::numeric IS NULL OR price <= $5)
";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: String,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    category: String,
    stock: i32,
    image_urls: Vec<String>,
    is_featured: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price: row.price,
            compare_at_price: row.compare_at_price,
            category: row.category,
            stock_level: StockLevel::from_quantity(row.stock),
            stock: row.stock,
            image_urls: row.image_urls,
            is_featured: row.is_featured,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockSummaryRow {
    out_of_stock: i64,
    low_stock: i64,
    in_stock: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of active products plus the total number of matches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(
        &self,
        filter: &ProductFilter,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let category = filter
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let search = filter.search_pattern();

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM shop.product WHERE {CATALOG_FILTER}"
        ))
        .bind(category)
        .bind(search.as_deref())
        .bind(filter.featured)
        .bind(filter.min_price)
        .bind(filter.max_price)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE {CATALOG_FILTER} \
             ORDER BY {} LIMIT $6 OFFSET $7",
            filter.sort.order_by()
        ))
        .bind(category)
        .bind(search.as_deref())
        .bind(filter.featured)
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(filter.page.limit)
        .bind(filter.page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Categories of active products with their product counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<CategoryCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryCount>(
            r"
            SELECT category, COUNT(*) AS count
            FROM shop.product
            WHERE is_active
            GROUP BY category
            ORDER BY category
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Get a product by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Whether a product with this exact name exists (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists_by_name(&self, name: &str) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM shop.product WHERE lower(name) = lower($1))",
        )
        .bind(name.trim())
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Insert a validated product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO shop.product
                (name, description, price, compare_at_price, category, stock,
                 image_urls, is_featured, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(&input.category)
        .bind(input.stock)
        .bind(&input.image_urls)
        .bind(input.is_featured)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Edit a product under a row lock.
    ///
    /// `edit` sees the stored product and returns its replacement fields.
    /// Checkout's stock decrement waits on the same lock, so an edit that
    /// leaves `stock` alone never overwrites a concurrent reservation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` (converted into `E`) if the
    /// product does not exist, or whatever `edit` returns.
    pub async fn edit<F, E>(&self, id: ProductId, edit: F) -> Result<Product, E>
    where
        F: FnOnce(&Product) -> Result<ProductInput, E>,
        E: From<RepositoryError>,
    {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let current: Product = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_i32())
        .fetch_optional(&mut *tx)
        .await
        .map_err(RepositoryError::from)?
        .ok_or(RepositoryError::NotFound)?
        .into();

        let input = edit(&current)?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop.product
            SET name = $2, description = $3, price = $4, compare_at_price = $5,
                category = $6, stock = $7, image_urls = $8, is_featured = $9,
                is_active = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(&input.category)
        .bind(input.stock)
        .bind(&input.image_urls)
        .bind(input.is_featured)
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(row.into())
    }

    /// Soft-delete a product so past orders keep their reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn deactivate(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.product SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_i32())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        // Removed products cannot stay in carts.
        sqlx::query("DELETE FROM shop.cart_item WHERE product_id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// All products (including inactive), lowest stock first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_inventory(
        &self,
        level: Option<StockLevel>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let (min, max) = level.map_or((i32::MIN, i32::MAX), |l| l.bounds());
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM shop.product
            WHERE stock BETWEEN $1 AND $2
            ORDER BY stock ASC, lower(name) ASC
            "
        ))
        .bind(min)
        .bind(max)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Set a product's stock count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn set_stock(&self, id: ProductId, stock: i32) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop.product SET stock = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(stock)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Product counts per stock bucket, over all products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stock_summary(&self) -> Result<StockSummary, RepositoryError> {
        let (_, low_max) = StockLevel::LowStock.bounds();
        let row = sqlx::query_as::<_, StockSummaryRow>(
            r"
            SELECT
                COUNT(*) FILTER (WHERE stock <= 0) AS out_of_stock,
                COUNT(*) FILTER (WHERE stock > 0 AND stock <= $1) AS low_stock,
                COUNT(*) FILTER (WHERE stock > $1) AS in_stock
            FROM shop.product
            ",
        )
        .bind(low_max)
        .fetch_one(self.pool)
        .await?;

        Ok(StockSummary {
            out_of_stock: row.out_of_stock,
            low_stock: row.low_stock,
            in_stock: row.in_stock,
        })
    }
}
