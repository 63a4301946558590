//! Order repository: checkout, history, and status changes.
//!
//! Stock is reserved when an order is placed (guarded decrement inside the
//! checkout transaction) and released when an order moves to `cancelled`.
//! Cancelled orders cannot be reopened.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use thiserror::Error;

use mindy_munchs_core::{
    OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId,
    shipping_fee,
};

use super::RepositoryError;
use crate::models::{Order, OrderItem, Page, ShippingAddress};

const ORDER_COLUMNS: &str = "id, user_id, status, payment_status, payment_method, \
     shipping_address, subtotal, shipping_fee, total, gateway_order_id, gateway_payment_id, \
     notes, created_at, updated_at";

/// Errors specific to placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to order.
    #[error("cart is empty")]
    EmptyCart,

    /// A product does not have enough units left.
    #[error("insufficient stock for {0}")]
    InsufficientStock(String),

    /// Underlying database failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// What a checkout needs besides the cart.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

/// Fields to change on an order; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusChange {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub gateway_payment_id: Option<String>,
}

/// Result of a status change.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub order: Order,
    pub previous_status: OrderStatus,
    pub previous_payment_status: PaymentStatus,
    /// Whether reserved stock was returned to the catalog.
    pub restocked: bool,
}

impl StatusUpdate {
    /// Whether the fulfillment status actually changed.
    #[must_use]
    pub fn status_changed(&self) -> bool {
        self.order.status != self.previous_status
    }
}

/// Filters for the admin order list.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderListFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub page: Page,
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_method: PaymentMethod,
    shipping_address: Json<ShippingAddress>,
    subtotal: Decimal,
    shipping_fee: Decimal,
    total: Decimal,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            status: self.status,
            payment_status: self.payment_status,
            payment_method: self.payment_method,
            shipping_address: self.shipping_address.0,
            subtotal: self.subtotal,
            shipping_fee: self.shipping_fee,
            total: self.total,
            gateway_order_id: self.gateway_order_id,
            gateway_payment_id: self.gateway_payment_id,
            notes: self.notes,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    name: String,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            product_id: ProductId::new(row.product_id),
            name: row.name,
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total: row.line_total,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CheckoutLineRow {
    product_id: i32,
    name: String,
    price: Decimal,
    quantity: i32,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turn the user's cart into an order in a single transaction.
    ///
    /// Each line's stock is decremented with a guarded update, the order and
    /// its snapshot items are inserted, and the cart is emptied. Any failure
    /// rolls the whole checkout back.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` if the cart has no active products.
    /// Returns `CheckoutError::InsufficientStock` naming the first short product.
    pub async fn place(&self, new_order: NewOrder) -> Result<Order, CheckoutError> {
        let mut tx = self.pool.begin().await?;

        let lines = sqlx::query_as::<_, CheckoutLineRow>(
            r"
            SELECT c.product_id, p.name, p.price, c.quantity
            FROM shop.cart_item c
            JOIN shop.product p ON p.id = c.product_id
            WHERE c.user_id = $1 AND p.is_active
            ORDER BY c.product_id
            FOR UPDATE OF p
            ",
        )
        .bind(new_order.user_id.as_i32())
        .fetch_all(&mut *tx)
        .await?;

        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        for line in &lines {
            let reserved = sqlx::query(
                r"
                UPDATE shop.product SET stock = stock - $2, updated_at = NOW()
                WHERE id = $1 AND stock >= $2
                ",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            if reserved.rows_affected() == 0 {
                return Err(CheckoutError::InsufficientStock(line.name.clone()));
            }
        }

        let subtotal: Decimal = lines
            .iter()
            .map(|line| line.price * Decimal::from(line.quantity))
            .sum();
        let shipping = shipping_fee(subtotal);

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO shop.customer_order
                (user_id, payment_method, shipping_address, subtotal, shipping_fee, total, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(new_order.user_id.as_i32())
        .bind(new_order.payment_method)
        .bind(Json(&new_order.shipping_address))
        .bind(subtotal)
        .bind(shipping)
        .bind(subtotal + shipping)
        .bind(new_order.notes.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item = sqlx::query_as::<_, OrderItemRow>(
                r"
                INSERT INTO shop.order_item
                    (order_id, product_id, name, unit_price, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, order_id, product_id, name, unit_price, quantity, line_total
                ",
            )
            .bind(row.id)
            .bind(line.product_id)
            .bind(&line.name)
            .bind(line.price)
            .bind(line.quantity)
            .bind(line.price * Decimal::from(line.quantity))
            .fetch_one(&mut *tx)
            .await?;
            items.push(item.into());
        }

        sqlx::query("DELETE FROM shop.cart_item WHERE user_id = $1")
            .bind(new_order.user_id.as_i32())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(row.into_order(items))
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.customer_order WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Find the order a gateway order id was created for.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.customer_order WHERE gateway_order_id = $1"
        ))
        .bind(gateway_order_id)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM shop.customer_order
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(user_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        self.attach_items(rows).await
    }

    /// All orders for the admin list, newest first, with the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &OrderListFilter,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        const WHERE: &str = "($1::text IS NULL OR status = $1) \
             AND ($2::text IS NULL OR payment_status = $2)";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM shop.customer_order WHERE {WHERE}"
        ))
        .bind(filter.status)
        .bind(filter.payment_status)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM shop.customer_order
            WHERE {WHERE}
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(filter.status)
        .bind(filter.payment_status)
        .bind(filter.page.limit)
        .bind(filter.page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((self.attach_items(rows).await?, total))
    }

    /// Record the gateway order created for an online payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn set_gateway_order_id(
        &self,
        id: OrderId,
        gateway_order_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.customer_order
            SET gateway_order_id = $2, payment_status = 'pending', updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .bind(gateway_order_id)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "Gateway order already linked"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Change an order's status fields under a row lock.
    ///
    /// `decide` sees the current order and returns the change to apply, or an
    /// error to abort without writing. When the status moves into
    /// `cancelled` from any other status, the order's items go back into
    /// stock. A cancelled order stays cancelled, so its stock is returned
    /// exactly once.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist,
    /// `RepositoryError::Conflict` if the change would reopen a cancelled
    /// order, or whatever `decide` returns.
    pub async fn change_status<F>(
        &self,
        id: OrderId,
        decide: F,
    ) -> Result<StatusUpdate, RepositoryError>
    where
        F: FnOnce(&Order) -> Result<StatusChange, RepositoryError>,
    {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.customer_order WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_i32())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let items = fetch_items(&mut tx, &[row.id])
            .await?
            .remove(&row.id)
            .unwrap_or_default();
        let current = row.into_order(items);
        let change = decide(&current)?;

        let new_status = change.status.unwrap_or(current.status);
        let new_payment_status = change.payment_status.unwrap_or(current.payment_status);
        let restock = releases_stock(current.status, new_status)?;

        if restock {
            sqlx::query(
                r"
                UPDATE shop.product p
                SET stock = p.stock + oi.quantity, updated_at = NOW()
                FROM shop.order_item oi
                WHERE oi.order_id = $1 AND p.id = oi.product_id
                ",
            )
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await?;
        }

        let updated = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE shop.customer_order
            SET status = $2, payment_status = $3,
                gateway_payment_id = COALESCE($4, gateway_payment_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(new_status)
        .bind(new_payment_status)
        .bind(change.gateway_payment_id.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(StatusUpdate {
            order: updated.into_order(current.items),
            previous_status: current.status,
            previous_payment_status: current.payment_status,
            restocked: restock,
        })
    }

    async fn attach_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let mut conn = self.pool.acquire().await?;
        let mut items = fetch_items(&mut conn, &ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect())
    }
}

/// Whether moving an order from `from` to `to` returns its stock.
fn releases_stock(from: OrderStatus, to: OrderStatus) -> Result<bool, RepositoryError> {
    match (from, to) {
        (OrderStatus::Cancelled, OrderStatus::Cancelled) => Ok(false),
        (OrderStatus::Cancelled, _) => Err(RepositoryError::Conflict(
            "Cancelled orders cannot be reopened".into(),
        )),
        (_, to) => Ok(to == OrderStatus::Cancelled),
    }
}

async fn fetch_items(
    conn: &mut sqlx::PgConnection,
    order_ids: &[i32],
) -> Result<HashMap<i32, Vec<OrderItem>>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT id, order_id, product_id, name, unit_price, quantity, line_total
        FROM shop.order_item
        WHERE order_id = ANY($1)
        ORDER BY id
        ",
    )
    .bind(order_ids)
    .fetch_all(conn)
    .await?;

    let mut grouped: HashMap<i32, Vec<OrderItem>> = HashMap::new();
    for row in rows {
        grouped.entry(row.order_id).or_default().push(row.into());
    }
    Ok(grouped)
}
