//! Catalog product domain types and input validation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use mindy_munchs_core::validation::{
    require_http_url, require_length, require_positive_amount, require_range,
};
use mindy_munchs_core::{ProductId, StockLevel, ValidationError};

use super::Page;

/// Maximum number of images a product may reference.
pub const MAX_IMAGES: usize = 10;

/// A catalog product.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub category: String,
    pub stock: i32,
    pub stock_level: StockLevel,
    pub image_urls: Vec<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields an admin supplies when creating or replacing a product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub compare_at_price: Option<Decimal>,
    pub category: String,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

impl ProductInput {
    /// Validate and normalize every field.
    ///
    /// # Errors
    ///
    /// Returns the first failing field.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let name = require_length("name", &self.name, 2, 100)?;
        let description = require_length("description", &self.description, 0, 2000)?;
        let price = require_positive_amount("price", self.price)?;
        let compare_at_price = match self.compare_at_price {
            Some(compare) => {
                let compare = require_positive_amount("compare_at_price", compare)?;
                if compare < price {
                    return Err(ValidationError::new(
                        "compare_at_price",
                        "must not be lower than price",
                    ));
                }
                Some(compare)
            }
            None => None,
        };
        let category = require_length("category", &self.category, 1, 50)?;
        let stock = require_range("stock", self.stock, 0, i32::MAX)?;

        if self.image_urls.len() > MAX_IMAGES {
            return Err(ValidationError::new(
                "image_urls",
                format!("must contain at most {MAX_IMAGES} images"),
            ));
        }
        let image_urls = self
            .image_urls
            .iter()
            .map(|url| require_http_url("image_urls", url))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            description,
            price,
            compare_at_price,
            category,
            stock,
            image_urls,
            is_featured: self.is_featured,
            is_active: self.is_active,
        })
    }
}

impl From<&Product> for ProductInput {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            compare_at_price: product.compare_at_price,
            category: product.category.clone(),
            stock: product.stock,
            image_urls: product.image_urls.clone(),
            is_featured: product.is_featured,
            is_active: product.is_active,
        }
    }
}

/// Partial product update; absent fields keep their current value.
///
/// `compare_at_price: null` clears the compare-at price.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub compare_at_price: Option<Option<Decimal>>,
    pub category: Option<String>,
    pub stock: Option<i32>,
    pub image_urls: Option<Vec<String>>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
}

impl ProductPatch {
    /// Overlay this patch on an existing product's fields.
    #[must_use]
    pub fn apply(self, mut base: ProductInput) -> ProductInput {
        if let Some(name) = self.name {
            base.name = name;
        }
        if let Some(description) = self.description {
            base.description = description;
        }
        if let Some(price) = self.price {
            base.price = price;
        }
        if let Some(compare_at_price) = self.compare_at_price {
            base.compare_at_price = compare_at_price;
        }
        if let Some(category) = self.category {
            base.category = category;
        }
        if let Some(stock) = self.stock {
            base.stock = stock;
        }
        if let Some(image_urls) = self.image_urls {
            base.image_urls = image_urls;
        }
        if let Some(is_featured) = self.is_featured {
            base.is_featured = is_featured;
        }
        if let Some(is_active) = self.is_active {
            base.is_active = is_active;
        }
        base
    }
}

/// Distinguishes a missing field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Catalog sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    /// SQL `ORDER BY` clause. Always ends with `id` so paging is stable.
    #[must_use]
    pub const fn order_by(&self) -> &'static str {
        match self {
            Self::Newest => "created_at DESC, id DESC",
            Self::PriceAsc => "price ASC, id ASC",
            Self::PriceDesc => "price DESC, id DESC",
            Self::Name => "lower(name) ASC, id ASC",
        }
    }
}

/// Storefront catalog query.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub featured: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
    pub page: Page,
}

impl ProductFilter {
    /// `search` wrapped for `ILIKE`, with `%`/`_`/`\` escaped.
    #[must_use]
    pub fn search_pattern(&self) -> Option<String> {
        let term = self.search.as_deref()?.trim();
        if term.is_empty() {
            return None;
        }
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        Some(format!("%{escaped}%"))
    }
}

/// Active product count per category.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> ProductInput {
        ProductInput {
            name: "  Ragi Choco Bites ".to_string(),
            description: "Millet cookies".to_string(),
            price: Decimal::new(24_900, 2),
            compare_at_price: Some(Decimal::new(29_900, 2)),
            category: "Cookies".to_string(),
            stock: 40,
            image_urls: vec!["https://cdn.mindymunchs.com/ragi.jpg".to_string()],
            is_featured: true,
            is_active: true,
        }
    }

    #[test]
    fn test_validate_trims_name() {
        assert_eq!(input().validate().unwrap().name, "Ragi Choco Bites");
    }

    #[test]
    fn test_validate_rejects_compare_below_price() {
        let mut product = input();
        product.compare_at_price = Some(Decimal::new(100, 0));
        assert_eq!(product.validate().unwrap_err().field, "compare_at_price");
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let mut product = input();
        product.price = Decimal::ZERO;
        assert_eq!(product.validate().unwrap_err().field, "price");

        let mut product = input();
        product.stock = -1;
        assert_eq!(product.validate().unwrap_err().field, "stock");

        let mut product = input();
        product.image_urls = vec!["ftp://files/x.jpg".to_string()];
        assert_eq!(product.validate().unwrap_err().field, "image_urls");

        let mut product = input();
        product.image_urls = vec!["https://a.com/x.jpg".to_string(); MAX_IMAGES + 1];
        assert_eq!(product.validate().unwrap_err().field, "image_urls");

        let mut product = input();
        product.category = "   ".to_string();
        assert_eq!(product.validate().unwrap_err().field, "category");
    }

    #[test]
    fn test_patch_keeps_absent_fields() {
        let patch: ProductPatch = serde_json::from_str(r#"{"stock": 5}"#).unwrap();
        let updated = patch.apply(input());
        assert_eq!(updated.stock, 5);
        assert_eq!(updated.compare_at_price, Some(Decimal::new(29_900, 2)));
    }

    #[test]
    fn test_patch_null_clears_compare_at_price() {
        let patch: ProductPatch = serde_json::from_str(r#"{"compare_at_price": null}"#).unwrap();
        assert_eq!(patch.apply(input()).compare_at_price, None);
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        let filter = ProductFilter {
            search: Some(" 100%_oat ".to_string()),
            ..ProductFilter::default()
        };
        assert_eq!(filter.search_pattern().unwrap(), "%100\\%\\_oat%");
        assert_eq!(ProductFilter::default().search_pattern(), None);
    }

    #[test]
    fn test_sort_parses_snake_case() {
        let sort: ProductSort = serde_json::from_str("\"price_desc\"").unwrap();
        assert_eq!(sort, ProductSort::PriceDesc);
    }
}
