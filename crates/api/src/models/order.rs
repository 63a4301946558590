//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use mindy_munchs_core::validation::{
    optional_length, require_length, require_phone, require_pincode,
};
use mindy_munchs_core::{
    OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId,
    ValidationError,
};

/// Delivery address captured at checkout. Stored as JSON on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

impl ShippingAddress {
    /// Validate and normalize every field.
    ///
    /// # Errors
    ///
    /// Returns the first failing field.
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            full_name: require_length("shipping_address.full_name", &self.full_name, 2, 100)?,
            phone: require_phone("shipping_address.phone", &self.phone)?,
            line1: require_length("shipping_address.line1", &self.line1, 1, 200)?,
            line2: optional_length("shipping_address.line2", self.line2.as_deref(), 200)?,
            city: require_length("shipping_address.city", &self.city, 1, 100)?,
            state: require_length("shipping_address.state", &self.state, 1, 100)?,
            pincode: require_pincode("shipping_address.pincode", &self.pincode)?,
        })
    }
}

/// A line item with the product name and price as they were at checkout.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// A placed order.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Receipt reference sent to the payment gateway.
    #[must_use]
    pub fn receipt(&self) -> String {
        format!("order_{}", self.id)
    }

    /// Products whose stock this order reserves.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|item| item.product_id).collect()
    }
}
