//! Address quota enforcement against the in-memory store.
//!
//! Run with: cargo test -p shopfloor-integration-tests

#![allow(clippy::unwrap_used)]

use shopfloor_core::AddressSlot;
use shopfloor_engine::CoreError;
use shopfloor_integration_tests::{address, memory_engine, new_user};
use tokio::task::JoinSet;

#[tokio::test]
async fn test_third_address_rejected() {
    let engine = memory_engine();
    let user = new_user(&engine).await;
    let book = engine.addresses();

    book.try_add_address(&user, address("A")).await.unwrap();
    assert_eq!(book.address_count(&user).await.unwrap(), 1);
    book.try_add_address(&user, address("B")).await.unwrap();
    assert_eq!(book.address_count(&user).await.unwrap(), 2);

    let err = book.try_add_address(&user, address("C")).await.unwrap_err();
    assert!(matches!(err, CoreError::QuotaExceeded { limit: 2 }));
    assert_eq!(err.status_code().as_u16(), 400);
    assert_eq!(book.address_count(&user).await.unwrap(), 2);

    let houses: Vec<_> = book
        .list_addresses(&user)
        .await
        .unwrap()
        .into_iter()
        .map(|a| (a.slot, a.fields.house))
        .collect();
    assert_eq!(
        houses,
        vec![
            (AddressSlot::Home, "A".to_owned()),
            (AddressSlot::Work, "B".to_owned())
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_adds_never_exceed_quota() {
    let engine = memory_engine();
    let user = new_user(&engine).await;

    let mut tasks = JoinSet::new();
    for n in 0..32 {
        let engine = engine.clone();
        let user = user.clone();
        tasks.spawn(async move {
            engine
                .addresses()
                .try_add_address(&user, address(&format!("house-{n}")))
                .await
        });
    }

    let mut added = 0;
    let mut rejected = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => added += 1,
            Err(CoreError::QuotaExceeded { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(added, 2);
    assert_eq!(rejected, 30);
    assert_eq!(engine.addresses().address_count(&user).await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_racing_adds_at_one_address() {
    for _ in 0..20 {
        let engine = memory_engine();
        let user = new_user(&engine).await;
        engine.addresses().try_add_address(&user, address("A")).await.unwrap();

        let (first, second) = tokio::join!(
            tokio::spawn({
                let (engine, user) = (engine.clone(), user.clone());
                async move { engine.addresses().try_add_address(&user, address("B")).await }
            }),
            tokio::spawn({
                let (engine, user) = (engine.clone(), user.clone());
                async move { engine.addresses().try_add_address(&user, address("C")).await }
            }),
        );
        let results = [first.unwrap(), second.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(CoreError::QuotaExceeded { .. })))
        );
        assert_eq!(engine.addresses().address_count(&user).await.unwrap(), 2);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_users_do_not_share_quota() {
    let engine = memory_engine();
    let mut users = Vec::new();
    for _ in 0..8 {
        users.push(new_user(&engine).await);
    }

    let mut tasks = JoinSet::new();
    for user in &users {
        for house in ["A", "B"] {
            let (engine, user) = (engine.clone(), user.clone());
            tasks.spawn(
                async move { engine.addresses().try_add_address(&user, address(house)).await },
            );
        }
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    for user in &users {
        assert_eq!(engine.addresses().address_count(user).await.unwrap(), 2);
    }
}

#[tokio::test]
async fn test_clear_frees_both_slots() {
    let engine = memory_engine();
    let user = new_user(&engine).await;
    let book = engine.addresses();

    book.try_add_address(&user, address("A")).await.unwrap();
    book.try_add_address(&user, address("B")).await.unwrap();
    book.clear_addresses(&user).await.unwrap();

    assert_eq!(book.address_count(&user).await.unwrap(), 0);
    book.try_add_address(&user, address("C")).await.unwrap();
    book.try_add_address(&user, address("D")).await.unwrap();
    assert_eq!(book.address_count(&user).await.unwrap(), 2);
}

#[tokio::test]
async fn test_edit_targets_slot() {
    let engine = memory_engine();
    let user = new_user(&engine).await;
    let book = engine.addresses();

    book.try_add_address(&user, address("A")).await.unwrap();
    book.try_add_address(&user, address("B")).await.unwrap();
    book.edit_address(&user, AddressSlot::Work, address("B2")).await.unwrap();

    let addresses = book.list_addresses(&user).await.unwrap();
    assert_eq!(addresses[0].fields.house, "A");
    assert_eq!(addresses[1].fields.house, "B2");
}
