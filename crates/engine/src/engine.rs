//! The assembled engine shared across request handlers.

use std::sync::Arc;

use shopfloor_core::{UserDocument, UserId};
use tracing::{info, instrument};

use crate::address::AddressBook;
use crate::cart::CartAggregator;
use crate::catalog::ProductCatalog;
use crate::config::{ConfigError, EngineConfig};
use crate::error::{Result, StoreError};
use crate::gateway::MutationGateway;
use crate::scope::Timeouts;
use crate::store::{DocumentStore, PgDocumentStore};

/// Error connecting an engine to its database.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Store(#[from] StoreError),
}

/// Every engine component wired to one store.
///
/// Cheaply cloneable; the store handle is built once at startup and passed in,
/// never held in a global.
pub struct Engine<S> {
    inner: Arc<EngineInner<S>>,
}

impl<S> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<S> {
    store: Arc<S>,
    timeouts: Timeouts,
    addresses: AddressBook<S>,
    carts: CartAggregator<S>,
    catalog: ProductCatalog<S>,
    gateway: MutationGateway<S>,
}

impl<S: DocumentStore> Engine<S> {
    /// Wire every component to `store`.
    #[must_use]
    pub fn new(store: Arc<S>, timeouts: Timeouts) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                addresses: AddressBook::new(Arc::clone(&store), timeouts),
                carts: CartAggregator::new(Arc::clone(&store), timeouts),
                catalog: ProductCatalog::new(Arc::clone(&store), timeouts),
                gateway: MutationGateway::new(Arc::clone(&store), timeouts),
                store,
                timeouts,
            }),
        }
    }

    /// The address quota enforcer.
    #[must_use]
    pub fn addresses(&self) -> &AddressBook<S> {
        &self.inner.addresses
    }

    /// The cart aggregator.
    #[must_use]
    pub fn carts(&self) -> &CartAggregator<S> {
        &self.inner.carts
    }

    #[must_use]
    pub fn catalog(&self) -> &ProductCatalog<S> {
        &self.inner.catalog
    }

    /// The cart/order mutation gateway.
    #[must_use]
    pub fn gateway(&self) -> &MutationGateway<S> {
        &self.inner.gateway
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    #[must_use]
    pub fn timeouts(&self) -> Timeouts {
        self.inner.timeouts
    }

    /// Create an empty user document and return its id.
    ///
    /// # Errors
    ///
    /// Returns a store error or timeout.
    #[instrument(skip(self))]
    pub async fn create_user(&self) -> Result<UserId> {
        let id = UserId::generate();
        self.inner
            .timeouts
            .mutation("create_user")
            .run(async { Ok(self.inner.store.insert_user(&UserDocument::empty(id)).await?) })
            .await?;
        info!(user_id = %id, "user created");
        Ok(id)
    }
}

impl Engine<PgDocumentStore> {
    /// Connect to `PostgreSQL`, apply migrations and wire the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the database URL is missing, the pool cannot
    /// connect, or a migration fails.
    pub async fn connect(config: &EngineConfig) -> std::result::Result<Self, ConnectError> {
        let url = config.require_database_url()?;
        let pool = crate::db::create_pool(url, config.max_connections).await?;
        crate::db::run_migrations(&pool).await?;
        info!(max_connections = config.max_connections, "connected to database");
        Ok(Self::new(Arc::new(PgDocumentStore::new(pool)), config.timeouts))
    }
}
