//! Aggregate queries for the admin dashboard.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use mindy_munchs_core::{OrderId, OrderStatus, PaymentStatus, ProductId};

use super::{ProductRepository, RepositoryError};
use crate::models::DashboardStats;
use crate::models::stats::{MonthlyRevenue, RecentOrder, TopProduct, Totals, facet_counts};

/// How many best sellers and recent orders the dashboard shows.
const DASHBOARD_LIST_SIZE: i64 = 5;

#[derive(Debug, sqlx::FromRow)]
struct TotalsRow {
    revenue: Decimal,
    orders: i64,
    users: i64,
    products: i64,
    subscribers: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct TopProductRow {
    product_id: i32,
    name: String,
    quantity_sold: i64,
    revenue: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct RecentOrderRow {
    id: i32,
    customer_name: String,
    customer_email: String,
    total: Decimal,
    status: OrderStatus,
    payment_status: PaymentStatus,
    created_at: DateTime<Utc>,
}

/// Repository for dashboard statistics.
pub struct StatsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StatsRepository<'a> {
    /// Create a new stats repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Compute every dashboard facet.
    ///
    /// Revenue counts only orders whose payment status is `paid`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any query fails.
    pub async fn dashboard(&self) -> Result<DashboardStats, RepositoryError> {
        let totals = sqlx::query_as::<_, TotalsRow>(
            r"
            SELECT
                (SELECT COALESCE(SUM(total), 0) FROM shop.customer_order
                    WHERE payment_status = 'paid') AS revenue,
                (SELECT COUNT(*) FROM shop.customer_order) AS orders,
                (SELECT COUNT(*) FROM shop.app_user) AS users,
                (SELECT COUNT(*) FROM shop.product WHERE is_active) AS products,
                (SELECT COUNT(*) FROM shop.guest WHERE is_subscribed) AS subscribers
            ",
        )
        .fetch_one(self.pool)
        .await?;

        let by_status = sqlx::query_as::<_, (OrderStatus, i64)>(
            "SELECT status, COUNT(*) FROM shop.customer_order GROUP BY status",
        )
        .fetch_all(self.pool)
        .await?;

        let by_payment = sqlx::query_as::<_, (PaymentStatus, i64)>(
            "SELECT payment_status, COUNT(*) FROM shop.customer_order GROUP BY payment_status",
        )
        .fetch_all(self.pool)
        .await?;

        let revenue_by_month = sqlx::query_as::<_, MonthlyRevenue>(
            r"
            SELECT to_char(m.month, 'YYYY-MM') AS month,
                   COALESCE(SUM(o.total), 0) AS revenue,
                   COUNT(o.id) AS orders
            FROM generate_series(
                     date_trunc('month', NOW()) - INTERVAL '11 months',
                     date_trunc('month', NOW()),
                     INTERVAL '1 month'
                 ) AS m(month)
            LEFT JOIN shop.customer_order o
                   ON o.payment_status = 'paid'
                  AND date_trunc('month', o.created_at) = m.month
            GROUP BY m.month
            ORDER BY m.month
            ",
        )
        .fetch_all(self.pool)
        .await?;

        let top_products = sqlx::query_as::<_, TopProductRow>(
            r"
            SELECT oi.product_id, p.name,
                   SUM(oi.quantity)::bigint AS quantity_sold,
                   SUM(oi.line_total) AS revenue
            FROM shop.order_item oi
            JOIN shop.customer_order o ON o.id = oi.order_id
            JOIN shop.product p ON p.id = oi.product_id
            WHERE o.status <> 'cancelled'
            GROUP BY oi.product_id, p.name
            ORDER BY quantity_sold DESC, revenue DESC
            LIMIT $1
            ",
        )
        .bind(DASHBOARD_LIST_SIZE)
        .fetch_all(self.pool)
        .await?;

        let recent_orders = sqlx::query_as::<_, RecentOrderRow>(
            r"
            SELECT o.id, u.name AS customer_name, u.email AS customer_email,
                   o.total, o.status, o.payment_status, o.created_at
            FROM shop.customer_order o
            JOIN shop.app_user u ON u.id = o.user_id
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $1
            ",
        )
        .bind(DASHBOARD_LIST_SIZE)
        .fetch_all(self.pool)
        .await?;

        let stock_levels = ProductRepository::new(self.pool).stock_summary().await?;

        Ok(DashboardStats {
            totals: Totals {
                revenue: totals.revenue,
                orders: totals.orders,
                users: totals.users,
                products: totals.products,
                subscribers: totals.subscribers,
            },
            orders_by_status: facet_counts(OrderStatus::ALL, by_status),
            payments_by_status: facet_counts(PaymentStatus::ALL, by_payment),
            revenue_by_month,
            top_products: top_products
                .into_iter()
                .map(|row| TopProduct {
                    product_id: ProductId::new(row.product_id),
                    name: row.name,
                    quantity_sold: row.quantity_sold,
                    revenue: row.revenue,
                })
                .collect(),
            recent_orders: recent_orders
                .into_iter()
                .map(|row| RecentOrder {
                    id: OrderId::new(row.id),
                    customer_name: row.customer_name,
                    customer_email: row.customer_email,
                    total: row.total,
                    status: row.status,
                    payment_status: row.payment_status,
                    created_at: row.created_at,
                })
                .collect(),
            stock_levels,
        })
    }
}
