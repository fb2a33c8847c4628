//! Catalog products.

use serde::{Deserialize, Serialize};

use super::{Price, ProductId};

/// A product record from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Units on hand. `None` means inventory is not tracked for this product.
    #[serde(default)]
    pub stock: Option<u32>,
}

impl Product {
    /// Whether `quantity` units can be sold right now.
    #[must_use]
    pub fn can_fulfil(&self, quantity: u32) -> bool {
        self.stock.is_none_or(|on_hand| on_hand >= quantity)
    }
}
