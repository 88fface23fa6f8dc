//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - id: 1
//!     name: Basmati Rice 5kg
//!     price: 64900   # minor units
//!     stock: 25
//! ```
//!
//! Rows are upserted by id in one transaction, so re-running a seed updates
//! names, prices and stock in place.

use std::path::Path;

use serde::Deserialize;

use pantry_core::cart::ProductSummary;
use pantry_storefront::db;

use super::{CliError, connect};

#[derive(Debug, Deserialize)]
struct SeedFile {
    products: Vec<ProductSummary>,
}

fn parse(yaml: &str) -> Result<Vec<ProductSummary>, CliError> {
    let file: SeedFile = serde_yaml::from_str(yaml)?;
    for product in &file.products {
        if product.price.minor() < 0 {
            return Err(CliError::Invalid(format!(
                "product {} has a negative price",
                product.id
            )));
        }
        if product.stock < 0 {
            return Err(CliError::Invalid(format!(
                "product {} has negative stock",
                product.id
            )));
        }
        if product.name.trim().is_empty() {
            return Err(CliError::Invalid(format!(
                "product {} has no name",
                product.id
            )));
        }
    }
    Ok(file.products)
}

/// Upsert products from a YAML file.
pub async fn products(path: &Path) -> Result<(), CliError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let products = parse(&yaml)?;

    let pool = connect().await?;
    let mut tx = pool.begin().await?;
    for product in &products {
        db::products::upsert(&mut tx, product).await?;
    }
    tx.commit().await?;

    tracing::info!(count = products.len(), "Seeded products");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed_file() {
        let products = parse(
            "products:\n  - id: 1\n    name: Rice\n    price: 64900\n    stock: 25\n  - id: 2\n    name: Dal\n    price: 15000\n    stock: 0\n",
        )
        .unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products.first().unwrap().price.minor(), 64900);
    }

    #[test]
    fn test_rejects_negative_stock() {
        let err = parse("products:\n  - id: 1\n    name: Rice\n    price: 1\n    stock: -1\n");
        assert!(matches!(err, Err(CliError::Invalid(_))));
    }
}
