//! Seed the catalog from a YAML file.
//!
//! The file is a list of products using the same fields as the admin
//! create-product request:
//!
//! ```yaml
//! - name: Ragi Chocolate Cookies
//!   description: Crunchy millet cookies with dark chocolate.
//!   price: "249.00"
//!   category: Cookies
//!   stock: 40
//!   image_urls: ["https://cdn.mindymunchs.com/ragi-cookies.jpg"]
//!   is_featured: true
//! ```

use std::path::Path;

use thiserror::Error;

use mindy_munchs_api::db::ProductRepository;
use mindy_munchs_api::models::ProductInput;
use mindy_munchs_core::ValidationError;

/// Problems with a seed file, reported before touching the database.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Product #{index} ({name}): {source}")]
    Invalid {
        index: usize,
        name: String,
        source: ValidationError,
    },
}

/// Parse and validate every product in a seed file.
///
/// # Errors
///
/// Returns the YAML error or the first invalid product.
pub fn parse_products(content: &str) -> Result<Vec<ProductInput>, SeedError> {
    let products: Vec<ProductInput> = serde_yaml::from_str(content)?;
    products
        .into_iter()
        .enumerate()
        .map(|(i, product)| {
            let name = product.name.clone();
            product.validate().map_err(|source| SeedError::Invalid {
                index: i + 1,
                name,
                source,
            })
        })
        .collect()
}

/// Insert products from `file_path`, skipping names that already exist.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, or a database
/// operation fails.
pub async fn products(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    tracing::info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;
    let products = parse_products(&content)?;
    tracing::info!(products = products.len(), "Seed file validated");

    let pool = super::connect().await?;
    let repo = ProductRepository::new(&pool);

    let (mut inserted, mut skipped) = (0_usize, 0_usize);
    for product in &products {
        if repo.exists_by_name(&product.name).await? {
            tracing::debug!(name = %product.name, "Product exists, skipping");
            skipped += 1;
            continue;
        }
        let created = repo.create(product).await?;
        tracing::info!(product_id = %created.id, name = %created.name, "Product inserted");
        inserted += 1;
    }

    tracing::info!(inserted, skipped, "Seeding complete!");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_parse_products_applies_defaults() {
        let products = parse_products(
            r#"
- name: "  Jowar Puffs  "
  price: "99.00"
  category: Snacks
"#,
        )
        .unwrap();

        assert_eq!(products.len(), 1);
        let puffs = &products[0];
        assert_eq!(puffs.name, "Jowar Puffs");
        assert_eq!(puffs.price, Decimal::new(9900, 2));
        assert_eq!(puffs.stock, 0);
        assert!(puffs.image_urls.is_empty());
        assert!(!puffs.is_featured);
        assert!(puffs.is_active);
    }

    #[test]
    fn test_parse_products_reports_invalid_entry() {
        let err = parse_products(
            r#"
- name: Ragi Cookies
  price: "249.00"
  category: Cookies
- name: Broken
  price: "-5"
  category: Cookies
"#,
        )
        .unwrap_err();

        assert!(matches!(err, SeedError::Invalid { index: 2, .. }));
        assert!(err.to_string().starts_with("Product #2 (Broken): price"));
    }

    #[test]
    fn test_parse_products_rejects_bad_yaml() {
        assert!(matches!(
            parse_products("name: [unclosed"),
            Err(SeedError::Yaml(_))
        ));
    }
}
