//! Read-through caches for product detail and dashboard statistics.
//!
//! Products are cached by id for 5 minutes and invalidated whenever a
//! product's fields or stock change through the API. Dashboard statistics are
//! a single expensive aggregate cached for 60 seconds.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use mindy_munchs_core::ProductId;

use crate::db::{ProductRepository, RepositoryError, StatsRepository};
use crate::models::{DashboardStats, Product};

/// Shared caches for catalog reads.
#[derive(Clone)]
pub struct CatalogCache {
    inner: Arc<CatalogCacheInner>,
}

struct CatalogCacheInner {
    products: Cache<ProductId, Product>,
    dashboard: Cache<(), DashboardStats>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    /// Create empty caches.
    #[must_use]
    pub fn new() -> Self {
        let products = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        let dashboard = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(60))
            .build();

        Self {
            inner: Arc::new(CatalogCacheInner {
                products,
                dashboard,
            }),
        }
    }

    /// Fetch a product by id (active or not), caching hits.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn product(
        &self,
        pool: &PgPool,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        if let Some(product) = self.inner.products.get(&id).await {
            debug!(product_id = %id, "Cache hit for product");
            return Ok(Some(product));
        }

        let product = ProductRepository::new(pool).get_by_id(id).await?;
        if let Some(product) = &product {
            self.inner.products.insert(id, product.clone()).await;
        }
        Ok(product)
    }

    /// Store a freshly written product.
    pub async fn store_product(&self, product: &Product) {
        self.inner.products.insert(product.id, product.clone()).await;
    }

    /// Drop cached products whose stock or fields changed.
    pub async fn invalidate_products(&self, ids: &[ProductId]) {
        for id in ids {
            self.inner.products.invalidate(id).await;
        }
    }

    /// Dashboard statistics, recomputed at most once a minute.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if any aggregate query fails.
    pub async fn dashboard(&self, pool: &PgPool) -> Result<DashboardStats, RepositoryError> {
        if let Some(stats) = self.inner.dashboard.get(&()).await {
            return Ok(stats);
        }

        let stats = StatsRepository::new(pool).dashboard().await?;
        self.inner.dashboard.insert((), stats.clone()).await;
        Ok(stats)
    }
}
