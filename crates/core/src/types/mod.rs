//! Core types for Shopfloor.
//!
//! This module provides type-safe wrappers for the store's document shapes.

pub mod address;
pub mod cart;
pub mod id;
pub mod order;
pub mod price;
pub mod product;
pub mod user;

pub use address::{Address, AddressFields, AddressSlot};
pub use cart::CartLine;
pub use id::*;
pub use order::Order;
pub use price::{Price, PriceError};
pub use product::Product;
pub use user::UserDocument;
