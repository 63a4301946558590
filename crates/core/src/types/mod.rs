//! Core types for Mindy Munchs.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod status;
pub mod stock;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, FLAT_SHIPPING_FEE, FREE_SHIPPING_THRESHOLD, Price, shipping_fee};
pub use status::*;
pub use stock::{LOW_STOCK_THRESHOLD, StockLevel};
