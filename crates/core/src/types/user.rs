//! The user document: one per user, embedding addresses, cart and orders.

use serde::{Deserialize, Serialize};

use super::{Address, AddressSlot, CartLine, Order, Price, UserId};

/// A user as stored in the `users` collection.
///
/// The id is required; the embedded arrays default to empty so documents
/// written before a field existed still decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub cart: Vec<CartLine>,
    #[serde(default)]
    pub orders: Vec<Order>,
}

impl UserDocument {
    /// A freshly signed-up user with nothing stored yet.
    #[must_use]
    pub const fn empty(id: UserId) -> Self {
        Self {
            id,
            addresses: Vec::new(),
            cart: Vec::new(),
            orders: Vec::new(),
        }
    }

    /// The address stored in `slot`, if any.
    #[must_use]
    pub fn address(&self, slot: AddressSlot) -> Option<&Address> {
        self.addresses.iter().find(|a| a.slot == slot)
    }

    /// The first slot without an address, home before work.
    #[must_use]
    pub fn first_vacant_slot(&self) -> Option<AddressSlot> {
        AddressSlot::ALL
            .into_iter()
            .find(|slot| self.address(*slot).is_none())
    }

    /// Sum of the cart's price snapshots.
    #[must_use]
    pub fn cart_total(&self) -> Price {
        self.cart.iter().map(|line| line.price).sum()
    }
}
