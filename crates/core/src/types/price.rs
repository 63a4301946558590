//! Type-safe price representation using decimal arithmetic.
//!
//! Catalog prices, order totals and shipping fees are all `Decimal` amounts in
//! the currency's standard unit (rupees, not paise). Conversion to the
//! gateway's minor unit happens in [`Price::minor_units`].

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Orders with a subtotal at or above this amount ship for free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(499, 0, 0, false, 0);

/// Flat shipping fee charged below [`FREE_SHIPPING_THRESHOLD`].
pub const FLAT_SHIPPING_FEE: Decimal = Decimal::from_parts(49, 0, 0, false, 0);

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., rupees, not paise).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a price in the store's default currency.
    #[must_use]
    pub fn inr(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::INR)
    }

    /// Format for display (e.g., "₹499.00").
    #[must_use]
    pub fn display(&self) -> String {
        format!(
            "{}{:.2}",
            self.currency_code.symbol(),
            self.amount.round_dp(2)
        )
    }

    /// Amount in the smallest currency unit (paise, cents), rounded half-up.
    ///
    /// Returns `None` for negative amounts or values that overflow `i64`.
    #[must_use]
    pub fn minor_units(&self) -> Option<i64> {
        if self.amount.is_sign_negative() {
            return None;
        }
        (self.amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// The three-letter ISO code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }
}

/// Shipping fee for a cart or order subtotal.
///
/// Empty carts cost nothing to ship; otherwise orders at or above
/// [`FREE_SHIPPING_THRESHOLD`] ship free and the rest pay [`FLAT_SHIPPING_FEE`].
#[must_use]
pub fn shipping_fee(subtotal: Decimal) -> Decimal {
    if subtotal <= Decimal::ZERO || subtotal >= FREE_SHIPPING_THRESHOLD {
        Decimal::ZERO
    } else {
        FLAT_SHIPPING_FEE
    }
}
