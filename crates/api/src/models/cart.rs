//! Shopping cart domain types.

use rust_decimal::Decimal;
use serde::Serialize;

use mindy_munchs_core::{ProductId, shipping_fee};

/// Most units of a single product a cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 20;

/// One cart line joined with the current product data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub line_total: Decimal,
    /// Units currently in stock, so the client can cap the quantity picker.
    pub stock: i32,
}

/// The caller's cart with computed totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cart {
    pub items: Vec<CartLine>,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
    pub item_count: i32,
}

impl Cart {
    /// Compute totals for a set of lines using the store's shipping rule.
    #[must_use]
    pub fn from_lines(items: Vec<CartLine>) -> Self {
        let subtotal: Decimal = items.iter().map(|line| line.line_total).sum();
        let item_count = items.iter().map(|line| line.quantity).sum();
        let shipping_fee = shipping_fee(subtotal);

        Self {
            items,
            subtotal,
            shipping_fee,
            total: subtotal + shipping_fee,
            item_count,
        }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
