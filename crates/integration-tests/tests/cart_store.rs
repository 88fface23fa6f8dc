//! Cart store behaviour against the real schema.
//!
//! These tests require a running `PostgreSQL` database; `DATABASE_URL` must
//! point at a server where the test user may create databases.
//!
//! Run with: cargo test -p pantry-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use sqlx::PgPool;

use pantry_core::cart::{AddToCartRequest, CartAction, UpdateCartRequest};
use pantry_core::{GuestSessionId, Owner};
use pantry_integration_tests::{create_user, seed_product};
use pantry_storefront::services::{CartError, CartService};

fn add(product_id: pantry_core::ProductId, quantity: i32) -> AddToCartRequest {
    AddToCartRequest {
        product_id,
        quantity: Some(quantity),
    }
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_add_twice_reports_exists_and_keeps_quantity(pool: PgPool) {
    let product = seed_product(&pool, 1, 1_000, 10).await;
    let owner = Owner::Guest(GuestSessionId::generate());
    let cart = CartService::new(&pool);

    let first = cart.add(&owner, &add(product, 2)).await.unwrap();
    assert_eq!(first.action, CartAction::Created);
    assert_eq!(first.item.quantity, 2);

    let second = cart.add(&owner, &add(product, 5)).await.unwrap();
    assert_eq!(second.action, CartAction::Exists);
    assert_eq!(second.item.quantity, 2);

    let view = cart.get(&owner).await.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.grand_total.minor(), 2_000);
    assert_eq!(cart.count(&owner).await.unwrap(), 2);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_adds_create_one_line(pool: PgPool) {
    let product = seed_product(&pool, 1, 500, 50).await;
    let owner = Owner::Guest(GuestSessionId::generate());

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let pool = pool.clone();
        tasks.spawn(async move { CartService::new(&pool).add(&owner, &add(product, 1)).await });
    }

    let mut created = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap().unwrap().action == CartAction::Created {
            created += 1;
        }
    }
    assert_eq!(created, 1);
    assert_eq!(CartService::new(&pool).count(&owner).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_add_beyond_stock_is_rejected(pool: PgPool) {
    let product = seed_product(&pool, 1, 100, 3).await;
    let owner = Owner::Guest(GuestSessionId::generate());

    let err = CartService::new(&pool)
        .add(&owner, &add(product, 4))
        .await
        .unwrap_err();
    match err {
        CartError::OutOfStock(shortage) => {
            assert_eq!(shortage.requested, 4);
            assert_eq!(shortage.available, 3);
        }
        other => panic!("expected OutOfStock, got {other:?}"),
    }
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_unknown_product_is_not_found(pool: PgPool) {
    let owner = Owner::Guest(GuestSessionId::generate());
    let err = CartService::new(&pool)
        .add(&owner, &add(pantry_core::ProductId::new(404), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::ProductNotFound(_)));
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_deltas_are_not_lost(pool: PgPool) {
    let product = seed_product(&pool, 1, 100, 50).await;
    let user = create_user(&pool, "deltas@example.com").await;
    let owner = Owner::User(user);
    CartService::new(&pool).add(&owner, &add(product, 1)).await.unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..5 {
        let pool = pool.clone();
        tasks.spawn(async move {
            CartService::new(&pool)
                .update(
                    &owner,
                    product,
                    &UpdateCartRequest {
                        quantity: None,
                        delta: Some(2),
                    },
                )
                .await
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    let view = CartService::new(&pool).get(&owner).await.unwrap();
    assert_eq!(view.line(product).unwrap().quantity, 11);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_set_quantity_lands_on_one_value(pool: PgPool) {
    let product = seed_product(&pool, 1, 100, 50).await;
    let owner = Owner::Guest(GuestSessionId::generate());
    CartService::new(&pool).add(&owner, &add(product, 1)).await.unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for quantity in [4, 9] {
        let pool = pool.clone();
        tasks.spawn(async move {
            CartService::new(&pool)
                .update(
                    &owner,
                    product,
                    &UpdateCartRequest {
                        quantity: Some(quantity),
                        delta: None,
                    },
                )
                .await
        });
    }
    while let Some(result) = tasks.join_next().await {
        assert_eq!(result.unwrap().unwrap().action, CartAction::Updated);
    }

    let quantity = CartService::new(&pool)
        .get(&owner)
        .await
        .unwrap()
        .line(product)
        .unwrap()
        .quantity;
    assert!(quantity == 4 || quantity == 9, "got {quantity}");
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_update_to_zero_deletes_line(pool: PgPool) {
    let product = seed_product(&pool, 1, 100, 5).await;
    let owner = Owner::Guest(GuestSessionId::generate());
    let cart = CartService::new(&pool);
    cart.add(&owner, &add(product, 2)).await.unwrap();

    let response = cart
        .update(
            &owner,
            product,
            &UpdateCartRequest {
                quantity: None,
                delta: Some(-2),
            },
        )
        .await
        .unwrap();
    assert_eq!(response.action, CartAction::Deleted);
    assert!(response.item.is_none());
    assert!(cart.get(&owner).await.unwrap().items.is_empty());

    let err = cart
        .update(
            &owner,
            product,
            &UpdateCartRequest {
                quantity: Some(1),
                delta: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::LineNotFound(_)));
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_remove_and_clear(pool: PgPool) {
    let a = seed_product(&pool, 1, 100, 5).await;
    let b = seed_product(&pool, 2, 250, 5).await;
    let owner = Owner::Guest(GuestSessionId::generate());
    let other = Owner::Guest(GuestSessionId::generate());
    let cart = CartService::new(&pool);

    cart.add(&owner, &add(a, 1)).await.unwrap();
    cart.add(&owner, &add(b, 2)).await.unwrap();
    cart.add(&other, &add(a, 1)).await.unwrap();

    cart.remove(&owner, a).await.unwrap();
    assert!(matches!(
        cart.remove(&owner, a).await,
        Err(CartError::LineNotFound(_))
    ));

    assert_eq!(cart.clear(&owner).await.unwrap(), 1);
    assert_eq!(cart.count(&owner).await.unwrap(), 0);
    // Other owners are untouched
    assert_eq!(cart.count(&other).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_quantity_is_bounded_by_stock(pool: PgPool) {
    let product = seed_product(&pool, 1, 100, 2).await;
    let owner = Owner::Guest(GuestSessionId::generate());
    let cart = CartService::new(&pool);
    let set = |quantity| UpdateCartRequest {
        quantity: Some(quantity),
        delta: None,
    };

    assert_eq!(
        cart.add(&owner, &add(product, 2)).await.unwrap().action,
        CartAction::Created
    );

    match cart.update(&owner, product, &set(3)).await.unwrap_err() {
        CartError::OutOfStock(shortage) => assert_eq!(shortage.available, 2),
        other => panic!("expected OutOfStock, got {other:?}"),
    }
    assert_eq!(cart.count(&owner).await.unwrap(), 2);

    let response = cart.update(&owner, product, &set(0)).await.unwrap();
    assert_eq!(response.action, CartAction::Deleted);
    assert_eq!(cart.count(&owner).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_negative_set_deletes_line(pool: PgPool) {
    let product = seed_product(&pool, 1, 100, 5).await;
    let owner = Owner::Guest(GuestSessionId::generate());
    let cart = CartService::new(&pool);
    cart.add(&owner, &add(product, 3)).await.unwrap();

    let response = cart
        .update(
            &owner,
            product,
            &UpdateCartRequest {
                quantity: Some(-1),
                delta: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(response.action, CartAction::Deleted);
    assert_eq!(cart.count(&owner).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_set_quantity_is_bounded_only_by_stock(pool: PgPool) {
    let product = seed_product(&pool, 1, 100, 500).await;
    let owner = Owner::Guest(GuestSessionId::generate());
    let cart = CartService::new(&pool);
    cart.add(&owner, &add(product, 1)).await.unwrap();

    let response = cart
        .update(
            &owner,
            product,
            &UpdateCartRequest {
                quantity: Some(150),
                delta: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(response.action, CartAction::Updated);
    assert_eq!(response.item.unwrap().quantity, 150);
}
