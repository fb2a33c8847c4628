//! Cart totals and order history.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use shopfloor_core::{CartLine, Order, Price, UserId};
use tracing::{error, instrument};

use crate::error::{CoreError, Result, StoreError};
use crate::pipeline::{
    ArrayField, COUNT, Collection, Filter, TOTAL, single_row, sum_array_field,
};
use crate::scope::Timeouts;
use crate::store::DocumentStore;

/// A cart total together with the lines it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub total: Price,
    pub lines: Vec<CartLine>,
}

fn parse_user(user_ref: &str) -> Result<UserId> {
    UserId::parse(user_ref).map_err(|e| CoreError::NotFound(e.to_string()))
}

/// Computes cart totals through the store's aggregation pipeline.
pub struct CartAggregator<S> {
    store: Arc<S>,
    timeouts: Timeouts,
}

impl<S: DocumentStore> CartAggregator<S> {
    #[must_use]
    pub const fn new(store: Arc<S>, timeouts: Timeouts) -> Self {
        Self { store, timeouts }
    }

    /// The cart total and its itemised lines.
    ///
    /// The lines and the server-side sum are read from one store snapshot, so
    /// the returned total always equals the sum of the returned lines even
    /// while other requests mutate the cart.
    ///
    /// # Errors
    ///
    /// - `CoreError::NotFound` for a malformed or unknown user
    /// - `CoreError::Store` if the stored cart disagrees with its own sum
    #[instrument(skip(self))]
    pub async fn compute_cart_total(&self, user_ref: &str) -> Result<CartSummary> {
        let user_id = parse_user(user_ref)?;
        let pipeline = sum_array_field(
            Collection::Users,
            Filter::Id(user_id.as_uuid()),
            ArrayField::Cart,
            "price",
        );

        self.timeouts
            .aggregation("compute_cart_total")
            .run(async {
                let snapshot = self
                    .store
                    .snapshot_user(user_id, &pipeline)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("user {user_id}")))?;

                let (total, count) = match single_row(snapshot.rows)? {
                    Some(row) => (row.sum(TOTAL)?, row.count(COUNT)?),
                    None => (Decimal::ZERO, 0),
                };
                let expected = snapshot.user.cart_total().amount();
                let lines = snapshot.user.cart;
                if count != lines.len() || total != expected {
                    error!(
                        %user_id,
                        lines = lines.len(),
                        aggregated = count,
                        "cart disagrees with its aggregate"
                    );
                    return Err(StoreError::DataCorruption(format!(
                        "cart total for user {user_id} does not match its lines"
                    ))
                    .into());
                }

                let total = Price::new(total)
                    .map_err(|e| StoreError::DataCorruption(format!("cart total: {e}")))?;
                Ok(CartSummary { total, lines })
            })
            .await
    }

    /// Orders the user has placed, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for a malformed or unknown user.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, user_ref: &str) -> Result<Vec<Order>> {
        let user_id = parse_user(user_ref)?;
        self.timeouts
            .aggregation("list_orders")
            .run(async {
                let user = self
                    .store
                    .find_user(user_id)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("user {user_id}")))?;
                Ok(user.orders)
            })
            .await
    }
}
