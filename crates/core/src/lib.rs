//! Shopfloor Core - Shared domain types.
//!
//! This crate provides the document shapes used by every Shopfloor component:
//! - `engine` - Address quota enforcement, cart aggregation and cart/order mutations
//! - `cli` - Operator commands for migrations, seeding and manual mutations
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no async runtime. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, prices, addresses, cart lines, orders, products and
//!   the user document that embeds them

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
