//! The cart and order mutation gateway.
//!
//! Every cart mutation follows the same path:
//!
//! 1. Validate the user and product references; nothing touches the store on failure.
//! 2. Resolve the product against the catalog.
//! 3. Run one conditional update inside a mutation scope.
//!
//! Checkout builds its order from the cart as the store holds it at commit
//! time, records it and clears the cart in the same update. The gateway
//! reports success only; callers re-read state afterwards.

use core::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use shopfloor_core::{CartLine, Order, OrderId, Product, ProductId, UserId};
use tracing::{info, instrument};

use crate::catalog::ProductCatalog;
use crate::error::{CoreError, Result};
use crate::scope::Timeouts;
use crate::store::DocumentStore;
use crate::update::{Operation, Precondition, UserUpdate};

/// The mutations the gateway dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOperation {
    Add,
    Remove,
    Checkout,
    InstantBuy,
}

impl CartOperation {
    /// Name used for scopes and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add_to_cart",
            Self::Remove => "remove_from_cart",
            Self::Checkout => "checkout",
            Self::InstantBuy => "instant_buy",
        }
    }

    /// Whether the operation acts on a specific product.
    #[must_use]
    pub const fn needs_product(self) -> bool {
        !matches!(self, Self::Checkout)
    }
}

impl fmt::Display for CartOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CartOperation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "add" | "add_to_cart" => Ok(Self::Add),
            "remove" | "remove_from_cart" => Ok(Self::Remove),
            "checkout" => Ok(Self::Checkout),
            "buy" | "instant_buy" => Ok(Self::InstantBuy),
            _ => Err(format!("unknown cart operation: {s}")),
        }
    }
}

/// Check that the references an operation needs are present and well formed.
///
/// # Errors
///
/// Returns `CoreError::InvalidRequest` naming the first bad reference.
pub fn validate_refs(
    operation: CartOperation,
    user_ref: Option<&str>,
    product_ref: Option<&str>,
) -> Result<(UserId, Option<ProductId>)> {
    let user_ref = user_ref
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| CoreError::InvalidRequest("user reference is required".to_string()))?;
    let user_id =
        UserId::parse(user_ref).map_err(|e| CoreError::InvalidRequest(e.to_string()))?;

    if !operation.needs_product() {
        return Ok((user_id, None));
    }

    let product_ref = product_ref
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| {
            CoreError::InvalidRequest(format!("{operation} requires a product reference"))
        })?;
    let product_id =
        ProductId::parse(product_ref).map_err(|e| CoreError::InvalidRequest(e.to_string()))?;
    Ok((user_id, Some(product_id)))
}

/// Build the conditional update for an operation.
fn build_update(operation: CartOperation, product: Option<&Product>) -> Result<UserUpdate> {
    let missing = || CoreError::InvalidRequest(format!("{operation} requires a product"));

    let update = match operation {
        CartOperation::Add => {
            let product = product.ok_or_else(missing)?;
            UserUpdate::new().then(Operation::PushCartLine(CartLine::from(product)))
        }
        CartOperation::Remove => {
            let product = product.ok_or_else(missing)?;
            UserUpdate::new()
                .require(Precondition::CartContains(product.id))
                .then(Operation::RemoveCartLine(product.id))
        }
        CartOperation::Checkout => UserUpdate::new()
            .require(Precondition::CartNotEmpty)
            .then(Operation::CheckoutCart {
                order_id: OrderId::generate(),
                placed_at: Utc::now(),
            }),
        CartOperation::InstantBuy => {
            let product = product.ok_or_else(missing)?;
            let order = Order::from_lines(
                OrderId::generate(),
                vec![CartLine::from(product)],
                Utc::now(),
            );
            UserUpdate::new().then(Operation::PlaceOrder(order))
        }
    };
    Ok(update)
}

/// Dispatches cart and order mutations to the store.
pub struct MutationGateway<S> {
    store: Arc<S>,
    catalog: ProductCatalog<S>,
    timeouts: Timeouts,
}

impl<S: DocumentStore> MutationGateway<S> {
    #[must_use]
    pub fn new(store: Arc<S>, timeouts: Timeouts) -> Self {
        Self {
            catalog: ProductCatalog::new(Arc::clone(&store), timeouts),
            store,
            timeouts,
        }
    }

    /// Apply a cart mutation for a user.
    ///
    /// # Errors
    ///
    /// - `CoreError::InvalidRequest` for missing or malformed references, or
    ///   checkout of an empty cart
    /// - `CoreError::NotFound` for an unknown user or product, or removing a
    ///   product not in the cart
    /// - `CoreError::OutOfStock` if a tracked product cannot cover the purchase
    /// - `CoreError::Store` / `CoreError::Timeout` on infrastructure faults; nothing was committed
    #[instrument(skip(self))]
    pub async fn mutate_cart(
        &self,
        operation: CartOperation,
        user_ref: Option<&str>,
        product_ref: Option<&str>,
    ) -> Result<()> {
        let (user_id, product_id) = validate_refs(operation, user_ref, product_ref)?;

        let product = match product_id {
            Some(id) => Some(self.catalog.resolve(id).await?),
            None => None,
        };
        let update = build_update(operation, product.as_ref())?;

        let applied = self
            .timeouts
            .mutation(operation.name())
            .run(async { Ok(self.store.update_user(user_id, &update).await?) })
            .await?
            .into_result(user_id)?;

        info!(
            %user_id,
            %operation,
            orders = applied.orders.len(),
            reserved = applied.reservations.len(),
            "cart mutation committed"
        );
        Ok(())
    }
}
