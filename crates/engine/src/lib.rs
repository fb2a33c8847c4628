//! Shopfloor engine.
//!
//! Address quota enforcement, cart aggregation and the cart/order mutation
//! gateway, over a pluggable [`store::DocumentStore`]. Every business rule
//! that spans a read and a write is expressed as one conditional update so
//! the store can apply it atomically.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod address;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod pipeline;
pub mod scope;
pub mod store;
pub mod telemetry;
pub mod update;

pub use address::AddressBook;
pub use cart::{CartAggregator, CartSummary};
pub use catalog::ProductCatalog;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{CoreError, Result, StoreError};
pub use gateway::{CartOperation, MutationGateway};
pub use scope::Timeouts;
pub use store::{DocumentStore, MemoryStore, PgDocumentStore};
