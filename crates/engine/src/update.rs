//! Conditional and compound user-document updates, expressed as data.
//!
//! A [`UserUpdate`] pairs preconditions with operations. A store evaluates the
//! whole update inside one atomic unit (a document lock or a row-locked
//! transaction): either every precondition holds and every operation applies,
//! or the document is left exactly as it was.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use shopfloor_core::{
    Address, AddressFields, AddressId, AddressSlot, CartLine, Order, OrderId, ProductId,
    UserDocument,
};

use crate::error::CoreError;

/// A predicate checked against the current document before any operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// The user holds fewer than `n` addresses.
    AddressCountBelow(usize),
    /// An address occupies this slot.
    SlotOccupied(AddressSlot),
    /// At least one cart line references this product.
    CartContains(ProductId),
    /// The cart has at least one line.
    CartNotEmpty,
}

/// A single change to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Append an address in the first vacant slot.
    PushAddress { id: AddressId, fields: AddressFields },
    /// Overwrite the fields of the address in `slot`.
    ReplaceAddress {
        slot: AddressSlot,
        fields: AddressFields,
    },
    /// Remove every address.
    ClearAddresses,
    /// Append a cart line.
    PushCartLine(CartLine),
    /// Remove the first cart line for this product.
    RemoveCartLine(ProductId),
    /// Record an order built from the cart as it is now, then empty the cart.
    CheckoutCart {
        order_id: OrderId,
        placed_at: DateTime<Utc>,
    },
    /// Record an order that did not come from the cart.
    PlaceOrder(Order),
}

/// Why an update was refused. The document is unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    AddressQuota { limit: usize },
    SlotEmpty(AddressSlot),
    NotInCart(ProductId),
    CartEmpty,
    OutOfStock(ProductId),
}

impl From<Rejection> for CoreError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::AddressQuota { limit } => Self::QuotaExceeded { limit },
            Rejection::SlotEmpty(slot) => Self::NotFound(format!("no {slot} address")),
            Rejection::NotInCart(product_id) => {
                Self::NotFound(format!("product {product_id} is not in the cart"))
            }
            Rejection::CartEmpty => Self::InvalidRequest("cart is empty".to_string()),
            Rejection::OutOfStock(product_id) => Self::OutOfStock(product_id),
        }
    }
}

/// Units of a product an update takes out of stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockReservation {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// What an applied update did, for the caller's logs and for stock handling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedUpdate {
    /// Slot given to a pushed address.
    pub assigned_slot: Option<AddressSlot>,
    /// Orders recorded by this update.
    pub orders: Vec<Order>,
    /// Stock to decrement in the same atomic unit, sorted by product id.
    pub reservations: Vec<StockReservation>,
}

/// Preconditions plus operations, evaluated atomically by a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    preconditions: Vec<Precondition>,
    operations: Vec<Operation>,
}

impl UserUpdate {
    /// An empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a precondition.
    #[must_use]
    pub fn require(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    /// Add an operation.
    #[must_use]
    pub fn then(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Evaluate against `current` and return the next document version.
    ///
    /// `current` is never modified; a store commits the returned document
    /// only after it has also applied the stock reservations.
    ///
    /// # Errors
    ///
    /// Returns the first [`Rejection`] hit by a precondition or operation.
    pub fn apply(
        &self,
        current: &UserDocument,
    ) -> Result<(UserDocument, AppliedUpdate), Rejection> {
        for precondition in &self.preconditions {
            check(precondition, current)?;
        }

        let mut doc = current.clone();
        let mut applied = AppliedUpdate::default();
        for operation in &self.operations {
            apply_operation(operation, &mut doc, &mut applied)?;
        }
        applied.reservations = reservations(&applied.orders);
        Ok((doc, applied))
    }
}

fn check(precondition: &Precondition, doc: &UserDocument) -> Result<(), Rejection> {
    match precondition {
        Precondition::AddressCountBelow(limit) => {
            if doc.addresses.len() < *limit {
                Ok(())
            } else {
                Err(Rejection::AddressQuota { limit: *limit })
            }
        }
        Precondition::SlotOccupied(slot) => doc
            .address(*slot)
            .map(|_| ())
            .ok_or(Rejection::SlotEmpty(*slot)),
        Precondition::CartContains(product_id) => {
            if doc.cart.iter().any(|line| line.product_id == *product_id) {
                Ok(())
            } else {
                Err(Rejection::NotInCart(*product_id))
            }
        }
        Precondition::CartNotEmpty => {
            if doc.cart.is_empty() {
                Err(Rejection::CartEmpty)
            } else {
                Ok(())
            }
        }
    }
}

fn apply_operation(
    operation: &Operation,
    doc: &mut UserDocument,
    applied: &mut AppliedUpdate,
) -> Result<(), Rejection> {
    match operation {
        Operation::PushAddress { id, fields } => {
            let slot = doc.first_vacant_slot().ok_or(Rejection::AddressQuota {
                limit: AddressSlot::QUOTA,
            })?;
            doc.addresses.push(Address {
                id: *id,
                slot,
                fields: fields.clone(),
            });
            applied.assigned_slot = Some(slot);
        }
        Operation::ReplaceAddress { slot, fields } => {
            let address = doc
                .addresses
                .iter_mut()
                .find(|a| a.slot == *slot)
                .ok_or(Rejection::SlotEmpty(*slot))?;
            address.fields = fields.clone();
        }
        Operation::ClearAddresses => doc.addresses.clear(),
        Operation::PushCartLine(line) => doc.cart.push(line.clone()),
        Operation::RemoveCartLine(product_id) => {
            let position = doc
                .cart
                .iter()
                .position(|line| line.product_id == *product_id)
                .ok_or(Rejection::NotInCart(*product_id))?;
            doc.cart.remove(position);
        }
        Operation::CheckoutCart {
            order_id,
            placed_at,
        } => {
            if doc.cart.is_empty() {
                return Err(Rejection::CartEmpty);
            }
            let lines = std::mem::take(&mut doc.cart);
            let order = Order::from_lines(*order_id, lines, *placed_at);
            doc.orders.push(order.clone());
            applied.orders.push(order);
        }
        Operation::PlaceOrder(order) => {
            doc.orders.push(order.clone());
            applied.orders.push(order.clone());
        }
    }
    Ok(())
}

/// One reservation per product, in product id order so concurrent writers
/// lock product rows in the same order.
fn reservations(orders: &[Order]) -> Vec<StockReservation> {
    let mut quantities: BTreeMap<ProductId, u32> = BTreeMap::new();
    for line in orders.iter().flat_map(|order| &order.lines) {
        let quantity = quantities.entry(line.product_id).or_insert(0);
        *quantity = quantity.saturating_add(1);
    }
    quantities
        .into_iter()
        .map(|(product_id, quantity)| StockReservation {
            product_id,
            quantity,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use shopfloor_core::{Price, UserId};

    fn fields(house: &str) -> AddressFields {
        AddressFields {
            house: house.to_owned(),
            street: "High St".to_owned(),
            city: "York".to_owned(),
            pincode: "YO1 7HH".to_owned(),
        }
    }

    fn line(product_id: ProductId, cents: u32) -> CartLine {
        CartLine {
            product_id,
            name: "Coconut chips".to_owned(),
            price: Price::from_cents(cents),
            rating: None,
            image: None,
        }
    }

    fn push_address(house: &str) -> UserUpdate {
        UserUpdate::new()
            .require(Precondition::AddressCountBelow(AddressSlot::QUOTA))
            .then(Operation::PushAddress {
                id: AddressId::generate(),
                fields: fields(house),
            })
    }

    #[test]
    fn test_push_address_assigns_slots_in_order() {
        let doc = UserDocument::empty(UserId::generate());

        let (doc, applied) = push_address("1").apply(&doc).unwrap();
        assert_eq!(applied.assigned_slot, Some(AddressSlot::Home));

        let (doc, applied) = push_address("2").apply(&doc).unwrap();
        assert_eq!(applied.assigned_slot, Some(AddressSlot::Work));

        assert_eq!(
            push_address("3").apply(&doc).unwrap_err(),
            Rejection::AddressQuota { limit: 2 }
        );
        assert_eq!(doc.addresses.len(), 2);
    }

    #[test]
    fn test_replace_requires_occupied_slot() {
        let doc = UserDocument::empty(UserId::generate());
        let update = UserUpdate::new()
            .require(Precondition::SlotOccupied(AddressSlot::Work))
            .then(Operation::ReplaceAddress {
                slot: AddressSlot::Work,
                fields: fields("9"),
            });
        assert_eq!(
            update.apply(&doc).unwrap_err(),
            Rejection::SlotEmpty(AddressSlot::Work)
        );
    }

    #[test]
    fn test_replace_edits_only_target_slot() {
        let (doc, _) = push_address("1").apply(&UserDocument::empty(UserId::generate())).unwrap();
        let (doc, _) = push_address("2").apply(&doc).unwrap();
        let update = UserUpdate::new().then(Operation::ReplaceAddress {
            slot: AddressSlot::Work,
            fields: fields("22"),
        });
        let (doc, _) = update.apply(&doc).unwrap();
        assert_eq!(doc.address(AddressSlot::Home).unwrap().fields.house, "1");
        assert_eq!(doc.address(AddressSlot::Work).unwrap().fields.house, "22");
    }

    #[test]
    fn test_remove_takes_one_line() {
        let product = ProductId::generate();
        let mut doc = UserDocument::empty(UserId::generate());
        doc.cart = vec![line(product, 100), line(product, 100)];

        let update = UserUpdate::new()
            .require(Precondition::CartContains(product))
            .then(Operation::RemoveCartLine(product));
        let (next, _) = update.apply(&doc).unwrap();
        assert_eq!(next.cart.len(), 1);
    }

    #[test]
    fn test_remove_absent_product_rejected() {
        let doc = UserDocument::empty(UserId::generate());
        let product = ProductId::generate();
        let update = UserUpdate::new()
            .require(Precondition::CartContains(product))
            .then(Operation::RemoveCartLine(product));
        assert_eq!(update.apply(&doc).unwrap_err(), Rejection::NotInCart(product));
    }

    #[test]
    fn test_checkout_moves_cart_into_order() {
        let a = ProductId::generate();
        let b = ProductId::generate();
        let mut doc = UserDocument::empty(UserId::generate());
        doc.cart = vec![line(a, 1000), line(b, 2500), line(a, 1000)];

        let update = UserUpdate::new()
            .require(Precondition::CartNotEmpty)
            .then(Operation::CheckoutCart {
                order_id: OrderId::generate(),
                placed_at: Utc::now(),
            });
        let (next, applied) = update.apply(&doc).unwrap();

        assert!(next.cart.is_empty());
        assert_eq!(next.orders.len(), 1);
        assert_eq!(next.orders[0].total, Price::from_cents(4500));
        assert_eq!(next.orders[0].lines, doc.cart);
        assert_eq!(applied.orders, next.orders);

        let quantity_of = |id| {
            applied
                .reservations
                .iter()
                .find(|r| r.product_id == id)
                .map(|r| r.quantity)
        };
        assert_eq!(quantity_of(a), Some(2));
        assert_eq!(quantity_of(b), Some(1));
    }

    #[test]
    fn test_checkout_empty_cart_rejected() {
        let doc = UserDocument::empty(UserId::generate());
        let update = UserUpdate::new()
            .require(Precondition::CartNotEmpty)
            .then(Operation::CheckoutCart {
                order_id: OrderId::generate(),
                placed_at: Utc::now(),
            });
        assert_eq!(update.apply(&doc).unwrap_err(), Rejection::CartEmpty);
    }

    #[test]
    fn test_rejection_maps_to_core_error() {
        assert!(matches!(
            CoreError::from(Rejection::AddressQuota { limit: 2 }),
            CoreError::QuotaExceeded { limit: 2 }
        ));
        assert!(matches!(
            CoreError::from(Rejection::NotInCart(ProductId::generate())),
            CoreError::NotFound(_)
        ));
        assert!(matches!(
            CoreError::from(Rejection::CartEmpty),
            CoreError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_rejection_leaves_input_untouched() {
        let product = ProductId::generate();
        let mut doc = UserDocument::empty(UserId::generate());
        doc.cart = vec![line(product, 500)];
        let before = doc.clone();

        // The first operation would apply, the second rejects.
        let update = UserUpdate::new()
            .then(Operation::PushCartLine(line(product, 500)))
            .then(Operation::RemoveCartLine(ProductId::generate()));
        assert!(update.apply(&doc).is_err());
        assert_eq!(doc, before);
    }
}
