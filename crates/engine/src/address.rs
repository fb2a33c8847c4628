//! Address quota enforcement.
//!
//! A user holds at most [`AddressSlot::QUOTA`] addresses. The count check and
//! the append are one conditional update evaluated by the store, so two
//! racing requests for the same user can never both take the last slot.

use std::sync::Arc;

use shopfloor_core::{Address, AddressFields, AddressId, AddressSlot, UserId};
use tracing::{info, instrument};

use crate::error::{CoreError, Result, StoreError};
use crate::pipeline::{ArrayField, COUNT, Collection, Filter, count_array_elements, single_row};
use crate::scope::Timeouts;
use crate::store::DocumentStore;
use crate::update::{Operation, Precondition, UserUpdate};

/// Parse a user reference for address operations.
///
/// A reference that cannot name a user is reported as not found.
fn parse_user(user_ref: &str) -> Result<UserId> {
    UserId::parse(user_ref).map_err(|e| CoreError::NotFound(e.to_string()))
}

/// Adds, edits and counts user addresses.
pub struct AddressBook<S> {
    store: Arc<S>,
    timeouts: Timeouts,
}

impl<S: DocumentStore> AddressBook<S> {
    #[must_use]
    pub const fn new(store: Arc<S>, timeouts: Timeouts) -> Self {
        Self { store, timeouts }
    }

    /// Append an address unless the user is already at quota.
    ///
    /// Returns the slot the address was given.
    ///
    /// # Errors
    ///
    /// - `CoreError::NotFound` for a malformed or unknown user
    /// - `CoreError::QuotaExceeded` if the user already holds the maximum
    /// - `CoreError::Store` / `CoreError::Timeout` on infrastructure faults
    #[instrument(skip(self, fields))]
    pub async fn try_add_address(
        &self,
        user_ref: &str,
        fields: AddressFields,
    ) -> Result<AddressSlot> {
        let user_id = parse_user(user_ref)?;
        let update = UserUpdate::new()
            .require(Precondition::AddressCountBelow(AddressSlot::QUOTA))
            .then(Operation::PushAddress {
                id: AddressId::generate(),
                fields,
            });

        let applied = self
            .timeouts
            .mutation("add_address")
            .run(async { Ok(self.store.update_user(user_id, &update).await?) })
            .await?
            .into_result(user_id)
            .inspect_err(|e| {
                if matches!(e, CoreError::QuotaExceeded { .. }) {
                    info!(%user_id, "address rejected, quota reached");
                }
            })?;

        let slot = applied.assigned_slot.ok_or_else(|| {
            CoreError::Store(StoreError::DataCorruption(
                "address appended without a slot".to_string(),
            ))
        })?;
        info!(%user_id, %slot, "address added");
        Ok(slot)
    }

    /// Replace the fields of the address in `slot`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown user or an empty slot.
    #[instrument(skip(self, fields))]
    pub async fn edit_address(
        &self,
        user_ref: &str,
        slot: AddressSlot,
        fields: AddressFields,
    ) -> Result<()> {
        let user_id = parse_user(user_ref)?;
        let update = UserUpdate::new()
            .require(Precondition::SlotOccupied(slot))
            .then(Operation::ReplaceAddress { slot, fields });

        self.timeouts
            .mutation("edit_address")
            .run(async { Ok(self.store.update_user(user_id, &update).await?) })
            .await?
            .into_result(user_id)?;
        info!(%user_id, %slot, "address edited");
        Ok(())
    }

    /// Remove every address the user holds.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown user.
    #[instrument(skip(self))]
    pub async fn clear_addresses(&self, user_ref: &str) -> Result<()> {
        let user_id = parse_user(user_ref)?;
        let update = UserUpdate::new().then(Operation::ClearAddresses);

        self.timeouts
            .mutation("clear_addresses")
            .run(async { Ok(self.store.update_user(user_id, &update).await?) })
            .await?
            .into_result(user_id)?;
        info!(%user_id, "addresses cleared");
        Ok(())
    }

    /// Number of addresses the user holds, computed by the store.
    ///
    /// An empty pipeline result means zero addresses, unless the user itself
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for a malformed or unknown user.
    #[instrument(skip(self))]
    pub async fn address_count(&self, user_ref: &str) -> Result<usize> {
        let user_id = parse_user(user_ref)?;
        let pipeline = count_array_elements(
            Collection::Users,
            Filter::Id(user_id.as_uuid()),
            ArrayField::Addresses,
        );

        self.timeouts
            .aggregation("address_count")
            .run(async {
                if let Some(row) = single_row(self.store.aggregate(&pipeline).await?)? {
                    return Ok(row.count(COUNT)?);
                }
                if self.store.find_user(user_id).await?.is_none() {
                    return Err(CoreError::NotFound(format!("user {user_id}")));
                }
                Ok(0)
            })
            .await
    }

    /// The user's addresses in slot order.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for a malformed or unknown user.
    #[instrument(skip(self))]
    pub async fn list_addresses(&self, user_ref: &str) -> Result<Vec<Address>> {
        let user_id = parse_user(user_ref)?;
        let user = self
            .timeouts
            .aggregation("list_addresses")
            .run(async {
                self.store
                    .find_user(user_id)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("user {user_id}")))
            })
            .await?;

        let mut addresses = user.addresses;
        addresses.sort_by_key(|a| a.slot);
        Ok(addresses)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use shopfloor_core::UserDocument;

    fn fields(house: &str) -> AddressFields {
        AddressFields {
            house: house.to_owned(),
            street: "MG Road".to_owned(),
            city: "Pune".to_owned(),
            pincode: "411001".to_owned(),
        }
    }

    async fn book_with_user() -> (AddressBook<MemoryStore>, String) {
        let store = Arc::new(MemoryStore::new());
        let id = UserId::generate();
        store.insert_user(&UserDocument::empty(id)).await.unwrap();
        (AddressBook::new(store, Timeouts::default()), id.to_string())
    }

    #[tokio::test]
    async fn test_quota_scenario() {
        let (book, user) = book_with_user().await;
        assert_eq!(book.address_count(&user).await.unwrap(), 0);

        assert_eq!(book.try_add_address(&user, fields("A")).await.unwrap(), AddressSlot::Home);
        assert_eq!(book.address_count(&user).await.unwrap(), 1);
        assert_eq!(book.try_add_address(&user, fields("B")).await.unwrap(), AddressSlot::Work);
        assert_eq!(book.address_count(&user).await.unwrap(), 2);

        let third = book.try_add_address(&user, fields("C")).await;
        assert!(matches!(third, Err(CoreError::QuotaExceeded { limit: 2 })));
        assert_eq!(book.address_count(&user).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_malformed_user_is_not_found() {
        let (book, _) = book_with_user().await;
        let result = book.try_add_address("not-a-uuid", fields("A")).await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
        let result = book.address_count("").await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let (book, _) = book_with_user().await;
        let stranger = UserId::generate().to_string();
        assert!(matches!(
            book.try_add_address(&stranger, fields("A")).await,
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(book.address_count(&stranger).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_edit_and_clear() {
        let (book, user) = book_with_user().await;
        let missing = book.edit_address(&user, AddressSlot::Work, fields("X")).await;
        assert!(matches!(missing, Err(CoreError::NotFound(_))));

        book.try_add_address(&user, fields("A")).await.unwrap();
        book.edit_address(&user, AddressSlot::Home, fields("A2")).await.unwrap();
        let listed = book.list_addresses(&user).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].fields.house, "A2");

        book.clear_addresses(&user).await.unwrap();
        assert_eq!(book.address_count(&user).await.unwrap(), 0);
        assert_eq!(book.try_add_address(&user, fields("D")).await.unwrap(), AddressSlot::Home);
    }
}
