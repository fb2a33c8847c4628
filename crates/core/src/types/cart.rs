//! Cart lines embedded in the user document.

use serde::{Deserialize, Serialize};

use super::{Price, Product, ProductId};

/// One product in a user's cart, with the price captured when it was added.
///
/// Adding the same product twice produces two lines; removal takes out one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    /// Price snapshot at add-time. Later catalog price changes do not apply.
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<&Product> for CartLine {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            price: product.price,
            rating: product.rating,
            image: product.image.clone(),
        }
    }
}
