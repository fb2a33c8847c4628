//! Product lookup.

use std::sync::Arc;

use shopfloor_core::{Product, ProductId};
use tracing::instrument;

use crate::error::{CoreError, Result};
use crate::scope::Timeouts;
use crate::store::DocumentStore;

/// Read and write access to catalog products.
pub struct ProductCatalog<S> {
    store: Arc<S>,
    timeouts: Timeouts,
}

impl<S: DocumentStore> ProductCatalog<S> {
    #[must_use]
    pub const fn new(store: Arc<S>, timeouts: Timeouts) -> Self {
        Self { store, timeouts }
    }

    /// Fetch a product by id.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` if no such product exists.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn resolve(&self, id: ProductId) -> Result<Product> {
        self.timeouts
            .aggregation("resolve_product")
            .run(async {
                self.store
                    .find_product(id)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("product {id}")))
            })
            .await
    }

    /// Insert or replace a product.
    ///
    /// # Errors
    ///
    /// Returns a store error or timeout.
    #[instrument(skip_all, fields(product_id = %product.id))]
    pub async fn upsert(&self, product: &Product) -> Result<()> {
        self.timeouts
            .mutation("upsert_product")
            .run(async { Ok(self.store.upsert_product(product).await?) })
            .await?;
        tracing::debug!(name = %product.name, "product stored");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use shopfloor_core::Price;

    #[tokio::test]
    async fn test_resolve_round_trip_and_missing() {
        let catalog = ProductCatalog::new(Arc::new(MemoryStore::new()), Timeouts::default());
        let product = Product {
            id: ProductId::generate(),
            name: "Masala chai".to_owned(),
            price: Price::from_cents(1250),
            rating: Some(4),
            image: None,
            stock: None,
        };
        catalog.upsert(&product).await.unwrap();
        assert_eq!(catalog.resolve(product.id).await.unwrap(), product);

        let missing = catalog.resolve(ProductId::generate()).await;
        assert!(matches!(missing, Err(CoreError::NotFound(_))));
    }
}
