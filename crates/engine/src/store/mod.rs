//! The document store seam.
//!
//! The engine never talks to a database directly; it hands pipelines and
//! [`UserUpdate`]s to a [`DocumentStore`]. Two backends ship with the crate:
//!
//! - [`MemoryStore`] - in-process documents behind per-document locks
//! - [`PgDocumentStore`] - `PostgreSQL` JSONB documents with row-locked transactions
//!
//! Both guarantee that an update is evaluated and committed as one unit, that
//! updates to the same user are serialized, and that updates to different
//! users do not wait on each other.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use shopfloor_core::{Product, ProductId, UserDocument, UserId};

use crate::error::{CoreError, StoreError};
use crate::pipeline::{AggregateRow, Pipeline};
use crate::update::{AppliedUpdate, Rejection, UserUpdate};

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

/// Result of submitting a [`UserUpdate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Every precondition held and every operation was committed.
    Applied(AppliedUpdate),
    /// No user document with that id.
    UserNotFound,
    /// Refused; nothing was committed.
    Rejected(Rejection),
}

impl UpdateOutcome {
    /// Turn the outcome into the caller-facing result.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for a missing user and the mapped
    /// rejection otherwise.
    pub fn into_result(self, user_id: UserId) -> Result<AppliedUpdate, CoreError> {
        match self {
            Self::Applied(applied) => Ok(applied),
            Self::UserNotFound => Err(CoreError::NotFound(format!("user {user_id}"))),
            Self::Rejected(rejection) => Err(rejection.into()),
        }
    }
}

/// A user document and a pipeline's result read from the same snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSnapshot {
    pub user: UserDocument,
    pub rows: Vec<AggregateRow>,
}

/// Operations a backing document store must provide.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Execute an aggregation pipeline server-side.
    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<AggregateRow>, StoreError>;

    /// Fetch a user document and run a users pipeline against the same
    /// snapshot, so no write can land between the two reads.
    ///
    /// Returns `None` when the user does not exist.
    async fn snapshot_user(
        &self,
        id: UserId,
        pipeline: &Pipeline,
    ) -> Result<Option<UserSnapshot>, StoreError>;

    /// Fetch a user document.
    async fn find_user(&self, id: UserId) -> Result<Option<UserDocument>, StoreError>;

    /// Insert a new user document.
    ///
    /// Fails with `StoreError::Conflict` if the id is taken.
    async fn insert_user(&self, user: &UserDocument) -> Result<(), StoreError>;

    /// Evaluate and commit a conditional update as one atomic unit, including
    /// any stock reservations it produces.
    async fn update_user(
        &self,
        id: UserId,
        update: &UserUpdate,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Fetch a product record.
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Insert or replace a product record.
    async fn upsert_product(&self, product: &Product) -> Result<(), StoreError>;
}
