//! Stock-level buckets used by the catalog and the inventory dashboard.

use serde::{Deserialize, Serialize};

/// Products with at most this many units (and at least one) are "low stock".
pub const LOW_STOCK_THRESHOLD: i32 = 10;

/// Coarse availability bucket derived from a stock count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    OutOfStock,
    LowStock,
    InStock,
}

impl StockLevel {
    /// Bucket a stock count. Negative counts are treated as out of stock.
    #[must_use]
    pub const fn from_quantity(quantity: i32) -> Self {
        if quantity <= 0 {
            Self::OutOfStock
        } else if quantity <= LOW_STOCK_THRESHOLD {
            Self::LowStock
        } else {
            Self::InStock
        }
    }

    /// The wire representation, also accepted by `FromStr`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfStock => "out_of_stock",
            Self::LowStock => "low_stock",
            Self::InStock => "in_stock",
        }
    }

    /// Inclusive stock bounds for this bucket, for use in SQL filters.
    #[must_use]
    pub const fn bounds(&self) -> (i32, i32) {
        match self {
            Self::OutOfStock => (i32::MIN, 0),
            Self::LowStock => (1, LOW_STOCK_THRESHOLD),
            Self::InStock => (LOW_STOCK_THRESHOLD + 1, i32::MAX),
        }
    }
}

impl std::str::FromStr for StockLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "out_of_stock" => Ok(Self::OutOfStock),
            "low_stock" => Ok(Self::LowStock),
            "in_stock" => Ok(Self::InStock),
            _ => Err(format!("invalid stock level: {s}")),
        }
    }
}

impl std::fmt::Display for StockLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(StockLevel::from_quantity(-3), StockLevel::OutOfStock);
        assert_eq!(StockLevel::from_quantity(0), StockLevel::OutOfStock);
        assert_eq!(StockLevel::from_quantity(1), StockLevel::LowStock);
        assert_eq!(StockLevel::from_quantity(10), StockLevel::LowStock);
        assert_eq!(StockLevel::from_quantity(11), StockLevel::InStock);
    }

    #[test]
    fn test_bounds_agree_with_bucketing() {
        for level in [StockLevel::OutOfStock, StockLevel::LowStock, StockLevel::InStock] {
            let (lo, hi) = level.bounds();
            assert_eq!(StockLevel::from_quantity(hi), level);
            if lo != i32::MIN {
                assert_eq!(StockLevel::from_quantity(lo), level);
            }
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("low_stock".parse::<StockLevel>(), Ok(StockLevel::LowStock));
        assert!("plenty".parse::<StockLevel>().is_err());
    }
}
