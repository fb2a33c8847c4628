//! Cart aggregation against the in-memory store.
//!
//! Run with: cargo test -p shopfloor-integration-tests

#![allow(clippy::unwrap_used)]

use shopfloor_core::{CartLine, Price};
use shopfloor_engine::{CartOperation, CoreError};
use shopfloor_integration_tests::{memory_engine, new_product, new_user};
use tokio::task::JoinSet;

fn line_sum(lines: &[CartLine]) -> Price {
    lines.iter().map(|l| l.price).sum()
}

#[tokio::test]
async fn test_ten_plus_twenty_five() {
    let engine = memory_engine();
    let user = new_user(&engine).await;
    let ten = new_product(&engine, 1000, None).await;
    let twenty_five = new_product(&engine, 2500, None).await;

    for product in [&ten, &twenty_five] {
        engine
            .gateway()
            .mutate_cart(CartOperation::Add, Some(&user), Some(product))
            .await
            .unwrap();
    }

    let summary = engine.carts().compute_cart_total(&user).await.unwrap();
    assert_eq!(summary.total, "35".parse().unwrap());
    assert_eq!(summary.lines.len(), 2);
}

#[tokio::test]
async fn test_empty_cart() {
    let engine = memory_engine();
    let user = new_user(&engine).await;

    let summary = engine.carts().compute_cart_total(&user).await.unwrap();
    assert_eq!(summary.total, Price::ZERO);
    assert!(summary.lines.is_empty());
}

#[tokio::test]
async fn test_total_is_idempotent() {
    let engine = memory_engine();
    let user = new_user(&engine).await;
    for cents in [199, 1, 4999, 1] {
        let product = new_product(&engine, cents, None).await;
        engine
            .gateway()
            .mutate_cart(CartOperation::Add, Some(&user), Some(&product))
            .await
            .unwrap();
    }

    let first = engine.carts().compute_cart_total(&user).await.unwrap();
    let second = engine.carts().compute_cart_total(&user).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.total, line_sum(&first.lines));
}

#[tokio::test]
async fn test_unknown_user_not_found() {
    let engine = memory_engine();
    let result = engine
        .carts()
        .compute_cart_total("00000000-0000-0000-0000-000000000000")
        .await;
    assert!(matches!(result, Err(CoreError::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_total_matches_lines_under_concurrent_adds() {
    let engine = memory_engine();
    let user = new_user(&engine).await;
    let product = new_product(&engine, 325, None).await;

    let mut writers = JoinSet::new();
    for _ in 0..50 {
        let (engine, user, product) = (engine.clone(), user.clone(), product.clone());
        writers.spawn(async move {
            engine
                .gateway()
                .mutate_cart(CartOperation::Add, Some(&user), Some(&product))
                .await
        });
    }

    while !writers.is_empty() {
        let summary = engine.carts().compute_cart_total(&user).await.unwrap();
        assert_eq!(summary.total, line_sum(&summary.lines));
        if let Some(joined) = writers.try_join_next() {
            joined.unwrap().unwrap();
        }
    }

    let summary = engine.carts().compute_cart_total(&user).await.unwrap();
    assert_eq!(summary.lines.len(), 50);
    assert_eq!(summary.total, Price::from_cents(325 * 50));
}
