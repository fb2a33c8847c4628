//! Integration tests for Shopfloor.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory store tests
//! cargo test -p shopfloor-integration-tests
//!
//! # PostgreSQL tests (ignored by default)
//! SHOPFLOOR_TEST_DATABASE_URL=postgres://localhost/shopfloor_test \
//!     cargo test -p shopfloor-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `address_quota` - quota enforcement, including racing adds
//! - `cart_totals` - total/lines agreement and idempotence
//! - `checkout` - atomic checkout, instant-buy and stock
//! - `postgres_store` - the same properties against `PostgreSQL`

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use secrecy::SecretString;
use shopfloor_core::{AddressFields, Price, Product, ProductId, UserId};
use shopfloor_engine::{DocumentStore, Engine, MemoryStore, PgDocumentStore, Timeouts, db};

/// Environment variable holding the `PostgreSQL` test database URL.
pub const TEST_DATABASE_URL: &str = "SHOPFLOOR_TEST_DATABASE_URL";

/// An engine over a fresh in-memory store.
#[must_use]
pub fn memory_engine() -> Engine<MemoryStore> {
    Engine::new(Arc::new(MemoryStore::new()), Timeouts::default())
}

/// An engine over the test database, with migrations applied.
///
/// # Panics
///
/// Panics if [`TEST_DATABASE_URL`] is unset or the database is unreachable.
#[allow(clippy::expect_used)]
pub async fn pg_engine() -> Engine<PgDocumentStore> {
    let url = std::env::var(TEST_DATABASE_URL)
        .map(SecretString::from)
        .expect("SHOPFLOOR_TEST_DATABASE_URL must be set for PostgreSQL tests");
    let pool = db::create_pool(&url, 20)
        .await
        .expect("Failed to connect to test database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    Engine::new(Arc::new(PgDocumentStore::new(pool)), Timeouts::default())
}

/// Create a user and return its id as the string form callers pass around.
///
/// # Panics
///
/// Panics if the store rejects the insert.
#[allow(clippy::expect_used)]
pub async fn new_user<S: DocumentStore>(engine: &Engine<S>) -> String {
    engine
        .create_user()
        .await
        .expect("Failed to create user")
        .to_string()
}

/// Insert a product with the given price and stock, returning its id string.
///
/// # Panics
///
/// Panics if the store rejects the upsert.
#[allow(clippy::expect_used)]
pub async fn new_product<S: DocumentStore>(
    engine: &Engine<S>,
    cents: u32,
    stock: Option<u32>,
) -> String {
    let product = Product {
        id: ProductId::generate(),
        name: format!("Test product {cents}"),
        price: Price::from_cents(cents),
        rating: None,
        image: None,
        stock,
    };
    engine
        .catalog()
        .upsert(&product)
        .await
        .expect("Failed to insert product");
    product.id.to_string()
}

/// Address fields distinguished by `house`.
#[must_use]
pub fn address(house: &str) -> AddressFields {
    AddressFields {
        house: house.to_owned(),
        street: "Linking Road".to_owned(),
        city: "Mumbai".to_owned(),
        pincode: "400050".to_owned(),
    }
}

/// Parse a user id produced by [`new_user`].
///
/// # Panics
///
/// Panics on a malformed id.
#[allow(clippy::expect_used)]
#[must_use]
pub fn user_id(user: &str) -> UserId {
    UserId::parse(user).expect("Fixture user id is valid")
}
