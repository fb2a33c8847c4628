//! Shipping addresses and their slot tags.
//!
//! A user holds at most one address per [`AddressSlot`]. The slot is stored on
//! the address itself instead of being implied by its array position.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::AddressId;

/// Which of the user's two address slots an address occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressSlot {
    Home,
    Work,
}

impl AddressSlot {
    /// All slots in allocation order.
    pub const ALL: [Self; 2] = [Self::Home, Self::Work];

    /// The per-user address quota, one address per slot.
    pub const QUOTA: usize = Self::ALL.len();
}

impl fmt::Display for AddressSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => write!(f, "home"),
            Self::Work => write!(f, "work"),
        }
    }
}

impl std::str::FromStr for AddressSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home" => Ok(Self::Home),
            "work" => Ok(Self::Work),
            _ => Err(format!("invalid address slot: {s}")),
        }
    }
}

/// The editable part of an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressFields {
    pub house: String,
    pub street: String,
    pub city: String,
    pub pincode: String,
}

/// A stored address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub slot: AddressSlot,
    #[serde(flatten)]
    pub fields: AddressFields,
}

impl Address {
    /// Create an address in the given slot with a fresh id.
    #[must_use]
    pub fn new(slot: AddressSlot, fields: AddressFields) -> Self {
        Self {
            id: AddressId::generate(),
            slot,
            fields,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_roundtrip() {
        for slot in AddressSlot::ALL {
            assert_eq!(slot.to_string().parse::<AddressSlot>().unwrap(), slot);
        }
        assert!("office".parse::<AddressSlot>().is_err());
    }

    #[test]
    fn test_quota_is_two() {
        assert_eq!(AddressSlot::QUOTA, 2);
    }

    #[test]
    fn test_fields_flattened() {
        let address = Address::new(
            AddressSlot::Work,
            AddressFields {
                house: "12B".to_owned(),
                street: "Mill Lane".to_owned(),
                city: "Leeds".to_owned(),
                pincode: "LS1 4AP".to_owned(),
            },
        );
        let value = serde_json::to_value(&address).unwrap();
        assert_eq!(value["slot"], "work");
        assert_eq!(value["city"], "Leeds");
    }
}
