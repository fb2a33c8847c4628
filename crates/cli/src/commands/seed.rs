//! Seed the catalog with products from a YAML file.
//!
//! ```yaml
//! products:
//!   - name: Banana chips
//!     price: "3.00"
//!     stock: 40
//!   - id: 5f0c8a4e-6f3b-4d0e-9a55-2f1f6f1d2b7a
//!     name: Masala chai
//!     price: "12.50"
//!     rating: 4
//! ```
//!
//! Products without an `id` get a fresh one; products with an `id` are
//! replaced in place.

use std::path::Path;

use serde::Deserialize;
use shopfloor_core::{Price, Product, ProductId};
use shopfloor_engine::config::EngineConfig;
use tracing::{error, info};

use super::{CliError, connect};

/// Highest rating a product may carry.
const MAX_RATING: u8 = 5;

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    #[serde(default)]
    pub id: Option<ProductId>,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub stock: Option<u32>,
}

impl From<SeedProduct> for Product {
    fn from(seed: SeedProduct) -> Self {
        Self {
            id: seed.id.unwrap_or_else(ProductId::generate),
            name: seed.name,
            price: seed.price,
            rating: seed.rating,
            image: seed.image,
            stock: seed.stock,
        }
    }
}

/// Check a parsed seed file, returning one message per problem.
#[must_use]
pub fn validate_seed(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();
    for (index, product) in seed.products.iter().enumerate() {
        if product.name.trim().is_empty() {
            errors.push(format!("products[{index}]: name is empty"));
        }
        if product.rating.is_some_and(|r| r > MAX_RATING) {
            errors.push(format!(
                "products[{index}] ({}): rating must be at most {MAX_RATING}",
                product.name
            ));
        }
    }
    errors
}

/// Load products from `path` and upsert them.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or the database rejects a write.
pub async fn products(config: &EngineConfig, path: &Path) -> Result<(), CliError> {
    info!(path = %path.display(), "Loading products from file");

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;
    info!(products = seed.products.len(), "Parsed seed file");

    // Validate before connecting
    let errors = validate_seed(&seed);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(CliError::InvalidSeed(errors.len()));
    }

    let engine = connect(config).await?;
    for product in seed.products.into_iter().map(Product::from) {
        engine.catalog().upsert(&product).await?;

        #[allow(clippy::print_stdout)]
        {
            println!("{}\t{}\t{}", product.id, product.price, product.name);
        }
    }

    info!("Seeding complete!");
    Ok(())
}
