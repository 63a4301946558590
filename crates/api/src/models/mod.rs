//! Domain models for the API.
//!
//! These are validated domain objects returned by repositories and
//! serialized directly as response bodies. Request payloads live next to the
//! handlers that accept them.

pub mod cart;
pub mod guest;
pub mod order;
pub mod product;
pub mod stats;
pub mod testimonial;
pub mod user;

pub use cart::{Cart, CartLine};
pub use guest::Guest;
pub use order::{Order, OrderItem, ShippingAddress};
pub use product::{CategoryCount, Product, ProductFilter, ProductInput, ProductSort};
pub use stats::{DashboardStats, StockSummary};
pub use testimonial::Testimonial;
pub use user::{AdminView, CurrentUser, User};

use serde::Serialize;

/// Default page size for paginated listings.
pub const DEFAULT_PAGE_SIZE: i64 = 12;

/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: i64 = 50;

/// Normalized `page`/`limit` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub page: i64,
    /// Items per page.
    pub limit: i64,
}

impl Page {
    /// Clamp raw query values: page ≥ 1, `1 ≤ limit ≤ MAX_PAGE_SIZE`.
    #[must_use]
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Row offset for SQL `OFFSET`.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// A page of results plus the totals the client needs for pagination.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    #[serde(flatten)]
    pub items: T,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    /// Wrap `items` for the given page and total row count.
    #[must_use]
    pub fn new(items: T, page: Page, total: i64) -> Self {
        let total_pages = if total <= 0 {
            0
        } else {
            (total + page.limit - 1) / page.limit
        };
        Self {
            items,
            page: page.page,
            limit: page.limit,
            total,
            total_pages,
        }
    }
}
