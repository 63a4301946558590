//! Admin dashboard aggregates.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use mindy_munchs_core::{OrderId, OrderStatus, PaymentStatus, ProductId, StockLevel};

/// Headline numbers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Totals {
    /// Sum of `total` over paid orders.
    pub revenue: Decimal,
    pub orders: i64,
    pub users: i64,
    pub products: i64,
    pub subscribers: i64,
}

/// Paid revenue for one calendar month (`YYYY-MM`).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MonthlyRevenue {
    pub month: String,
    pub revenue: Decimal,
    pub orders: i64,
}

/// A best-selling product.
#[derive(Debug, Clone, Serialize)]
pub struct TopProduct {
    pub product_id: ProductId,
    pub name: String,
    pub quantity_sold: i64,
    pub revenue: Decimal,
}

/// A row of the recent orders table.
#[derive(Debug, Clone, Serialize)]
pub struct RecentOrder {
    pub id: OrderId,
    pub customer_name: String,
    pub customer_email: String,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// Product counts per stock bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StockSummary {
    pub out_of_stock: i64,
    pub low_stock: i64,
    pub in_stock: i64,
}

impl StockSummary {
    /// Bucket raw stock counts.
    pub fn from_quantities<I: IntoIterator<Item = i32>>(quantities: I) -> Self {
        let mut summary = Self::default();
        for quantity in quantities {
            summary.add(StockLevel::from_quantity(quantity), 1);
        }
        summary
    }

    /// Add `count` products to a bucket.
    pub const fn add(&mut self, level: StockLevel, count: i64) {
        match level {
            StockLevel::OutOfStock => self.out_of_stock += count,
            StockLevel::LowStock => self.low_stock += count,
            StockLevel::InStock => self.in_stock += count,
        }
    }
}

/// Everything the admin dashboard shows, in one response.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub totals: Totals,
    /// Every status is present, zero-filled.
    pub orders_by_status: BTreeMap<&'static str, i64>,
    /// Every payment status is present, zero-filled.
    pub payments_by_status: BTreeMap<&'static str, i64>,
    /// The last 12 months, oldest first; months without sales are zero.
    pub revenue_by_month: Vec<MonthlyRevenue>,
    pub top_products: Vec<TopProduct>,
    pub recent_orders: Vec<RecentOrder>,
    pub stock_levels: StockSummary,
}

/// Zero-filled facet counts keyed by each allowed value.
pub fn facet_counts<T, I>(all: &[T], counts: I) -> BTreeMap<&'static str, i64>
where
    T: Copy + PartialEq + FacetKey,
    I: IntoIterator<Item = (T, i64)>,
{
    let mut facets: BTreeMap<&'static str, i64> = all.iter().map(|v| (v.key(), 0)).collect();
    for (value, count) in counts {
        *facets.entry(value.key()).or_insert(0) += count;
    }
    facets
}

/// String key used for facet maps.
pub trait FacetKey {
    fn key(&self) -> &'static str;
}

impl FacetKey for OrderStatus {
    fn key(&self) -> &'static str {
        self.as_str()
    }
}

impl FacetKey for PaymentStatus {
    fn key(&self) -> &'static str {
        self.as_str()
    }
}
