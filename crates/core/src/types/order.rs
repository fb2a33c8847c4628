//! Orders, the immutable record of a checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CartLine, OrderId, Price};

/// A snapshot of purchased lines plus their total.
///
/// Orders are append-only: once pushed onto a user document they are never
/// edited or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub lines: Vec<CartLine>,
    pub total: Price,
    pub placed_at: DateTime<Utc>,
}

impl Order {
    /// Build an order from lines, computing the total from those same lines.
    #[must_use]
    pub fn from_lines(id: OrderId, lines: Vec<CartLine>, placed_at: DateTime<Utc>) -> Self {
        let total = lines.iter().map(|line| line.price).sum();
        Self {
            id,
            lines,
            total,
            placed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProductId;

    fn line(cents: u32) -> CartLine {
        CartLine {
            product_id: ProductId::generate(),
            name: "Dried mango".to_owned(),
            price: Price::from_cents(cents),
            rating: None,
            image: None,
        }
    }

    #[test]
    fn test_total_matches_lines() {
        let order = Order::from_lines(
            OrderId::generate(),
            vec![line(1000), line(2500)],
            Utc::now(),
        );
        assert_eq!(order.total, Price::from_cents(3500));
        assert_eq!(order.lines.len(), 2);
    }
}
