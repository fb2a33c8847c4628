//! In-process document store.
//!
//! Each user document sits behind its own mutex; the map of documents is
//! behind an `RwLock` that writers take only to insert. An update locks one
//! document, evaluates, reserves stock and commits without yielding to the
//! runtime, so a cancelled caller can never observe half an update.
//!
//! Lock order is always user document, then products.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use shopfloor_core::{Product, ProductId, UserDocument, UserId};

use super::{DocumentStore, UpdateOutcome, UserSnapshot};
use crate::error::StoreError;
use crate::pipeline::{AggregateRow, Collection, Pipeline};
use crate::update::{Rejection, StockReservation, UserUpdate};

type Document = Arc<Mutex<UserDocument>>;

/// A [`DocumentStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<UserId, Document>>,
    products: Mutex<HashMap<ProductId, Product>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn document(&self, id: UserId) -> Result<Option<Document>, StoreError> {
        let users = self.users.read().map_err(|_| StoreError::Poisoned)?;
        Ok(users.get(&id).cloned())
    }

    fn user_snapshots(
        &self,
        only: Option<uuid::Uuid>,
    ) -> Result<Vec<(uuid::Uuid, serde_json::Value)>, StoreError> {
        let documents: Vec<Document> = {
            let users = self.users.read().map_err(|_| StoreError::Poisoned)?;
            users
                .iter()
                .filter(|(id, _)| only.is_none_or(|wanted| id.as_uuid() == wanted))
                .map(|(_, doc)| Arc::clone(doc))
                .collect()
        };

        let mut snapshots = Vec::with_capacity(documents.len());
        for doc in documents {
            let doc = doc.lock().map_err(|_| StoreError::Poisoned)?;
            snapshots.push((doc.id.as_uuid(), serde_json::to_value(&*doc)?));
        }
        Ok(snapshots)
    }

    fn product_snapshots(
        &self,
        only: Option<uuid::Uuid>,
    ) -> Result<Vec<(uuid::Uuid, serde_json::Value)>, StoreError> {
        let products = self.products.lock().map_err(|_| StoreError::Poisoned)?;
        products
            .values()
            .filter(|p| only.is_none_or(|wanted| p.id.as_uuid() == wanted))
            .map(|p| Ok((p.id.as_uuid(), serde_json::to_value(p)?)))
            .collect()
    }

    /// Check every reservation, then decrement. Nothing changes on failure.
    fn reserve_stock(
        &self,
        reservations: &[StockReservation],
    ) -> Result<Option<Rejection>, StoreError> {
        if reservations.is_empty() {
            return Ok(None);
        }
        let mut products = self.products.lock().map_err(|_| StoreError::Poisoned)?;

        for reservation in reservations {
            let available = products
                .get(&reservation.product_id)
                .is_some_and(|p| p.can_fulfil(reservation.quantity));
            if !available {
                return Ok(Some(Rejection::OutOfStock(reservation.product_id)));
            }
        }

        for reservation in reservations {
            if let Some(product) = products.get_mut(&reservation.product_id)
                && let Some(on_hand) = product.stock.as_mut()
            {
                *on_hand -= reservation.quantity;
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<AggregateRow>, StoreError> {
        let only = pipeline.matched_id();
        let documents = match pipeline.collection {
            Collection::Users => self.user_snapshots(only)?,
            Collection::Products => self.product_snapshots(only)?,
        };
        tracing::debug!(
            collection = pipeline.collection.name(),
            documents = documents.len(),
            "evaluating pipeline"
        );
        pipeline.evaluate(documents)
    }

    async fn snapshot_user(
        &self,
        id: UserId,
        pipeline: &Pipeline,
    ) -> Result<Option<UserSnapshot>, StoreError> {
        if pipeline.collection != Collection::Users {
            return Err(StoreError::Unsupported(format!(
                "user snapshot over {}",
                pipeline.collection.name()
            )));
        }
        let Some(doc) = self.document(id)? else {
            return Ok(None);
        };
        let doc = doc.lock().map_err(|_| StoreError::Poisoned)?;
        let rows = pipeline.evaluate([(doc.id.as_uuid(), serde_json::to_value(&*doc)?)])?;
        Ok(Some(UserSnapshot {
            user: doc.clone(),
            rows,
        }))
    }

    async fn find_user(&self, id: UserId) -> Result<Option<UserDocument>, StoreError> {
        let Some(doc) = self.document(id)? else {
            return Ok(None);
        };
        let doc = doc.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(Some(doc.clone()))
    }

    async fn insert_user(&self, user: &UserDocument) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(|_| StoreError::Poisoned)?;
        if users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} already exists", user.id)));
        }
        users.insert(user.id, Arc::new(Mutex::new(user.clone())));
        Ok(())
    }

    async fn update_user(
        &self,
        id: UserId,
        update: &UserUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        let Some(doc) = self.document(id)? else {
            return Ok(UpdateOutcome::UserNotFound);
        };
        let mut doc = doc.lock().map_err(|_| StoreError::Poisoned)?;

        let (next, applied) = match update.apply(&doc) {
            Ok(result) => result,
            Err(rejection) => return Ok(UpdateOutcome::Rejected(rejection)),
        };
        if let Some(rejection) = self.reserve_stock(&applied.reservations)? {
            return Ok(UpdateOutcome::Rejected(rejection));
        }

        *doc = next;
        Ok(UpdateOutcome::Applied(applied))
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let products = self.products.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(products.get(&id).cloned())
    }

    async fn upsert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut products = self.products.lock().map_err(|_| StoreError::Poisoned)?;
        products.insert(product.id, product.clone());
        Ok(())
    }
}
