//! Guest to user cart merge.
//!
//! Run with: cargo test -p pantry-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use sqlx::PgPool;

use pantry_core::cart::AddToCartRequest;
use pantry_core::{GuestSessionId, Owner, ProductId};
use pantry_integration_tests::{create_user, seed_product, stock_of};
use pantry_storefront::services::{CartService, MergeService};

async fn put(pool: &PgPool, owner: &Owner, product_id: ProductId, quantity: i32) {
    CartService::new(pool)
        .add(
            owner,
            &AddToCartRequest {
                product_id,
                quantity: Some(quantity),
            },
        )
        .await
        .unwrap();
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_merge_clamps_to_stock_and_warns(pool: PgPool) {
    let product = seed_product(&pool, 1, 100, 5).await;
    let user = create_user(&pool, "clamp@example.com").await;
    let guest = GuestSessionId::generate();

    put(&pool, &Owner::User(user), product, 2).await;
    put(&pool, &Owner::Guest(guest), product, 3).await;
    // Stock drops after both carts were filled
    pantry_storefront::db::products::set_stock(&mut pool.acquire().await.unwrap(), product, 3)
        .await
        .unwrap();

    let outcome = MergeService::new(&pool).merge(guest, user).await.unwrap();
    assert_eq!(outcome.merged, 1);
    assert_eq!(outcome.warnings.len(), 1);
    let warning = outcome.warnings.first().unwrap();
    assert_eq!(warning.product_id, product);
    assert_eq!(warning.requested, 5);
    assert_eq!(warning.granted, 3);

    let cart = CartService::new(&pool);
    let user_cart = cart.get(&Owner::User(user)).await.unwrap();
    assert_eq!(user_cart.line(product).unwrap().quantity, 3);
    assert!(cart.get(&Owner::Guest(guest)).await.unwrap().items.is_empty());
    // Merging never touches stock
    assert_eq!(stock_of(&pool, product).await, 3);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_merge_moves_guest_only_lines(pool: PgPool) {
    let rice = seed_product(&pool, 1, 64_900, 10).await;
    let dal = seed_product(&pool, 2, 15_900, 10).await;
    let user = create_user(&pool, "move@example.com").await;
    let guest = GuestSessionId::generate();

    put(&pool, &Owner::User(user), rice, 1).await;
    put(&pool, &Owner::Guest(guest), dal, 4).await;

    let outcome = MergeService::new(&pool).merge(guest, user).await.unwrap();
    assert_eq!(outcome.merged, 1);
    assert!(outcome.warnings.is_empty());

    let cart = CartService::new(&pool).get(&Owner::User(user)).await.unwrap();
    assert_eq!(cart.line(rice).unwrap().quantity, 1);
    assert_eq!(cart.line(dal).unwrap().quantity, 4);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_merge_drops_sold_out_lines(pool: PgPool) {
    let product = seed_product(&pool, 1, 100, 5).await;
    let user = create_user(&pool, "soldout@example.com").await;
    let guest = GuestSessionId::generate();

    put(&pool, &Owner::Guest(guest), product, 2).await;
    pantry_storefront::db::products::set_stock(&mut pool.acquire().await.unwrap(), product, 0)
        .await
        .unwrap();

    let outcome = MergeService::new(&pool).merge(guest, user).await.unwrap();
    assert_eq!(outcome.merged, 0);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(
        CartService::new(&pool)
            .get(&Owner::User(user))
            .await
            .unwrap()
            .items
            .is_empty()
    );
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_merge_of_empty_guest_cart_is_noop(pool: PgPool) {
    let product = seed_product(&pool, 1, 100, 5).await;
    let user = create_user(&pool, "empty@example.com").await;
    put(&pool, &Owner::User(user), product, 2).await;

    let outcome = MergeService::new(&pool)
        .merge(GuestSessionId::generate(), user)
        .await
        .unwrap();
    assert_eq!(outcome.merged, 0);
    assert!(outcome.warnings.is_empty());
    assert_eq!(
        CartService::new(&pool).count(&Owner::User(user)).await.unwrap(),
        2
    );
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_merge_keeps_large_sums_within_stock(pool: PgPool) {
    let product = seed_product(&pool, 1, 100, 500).await;
    let user = create_user(&pool, "bulk@example.com").await;
    let guest = GuestSessionId::generate();

    put(&pool, &Owner::User(user), product, 80).await;
    put(&pool, &Owner::Guest(guest), product, 80).await;

    let outcome = MergeService::new(&pool).merge(guest, user).await.unwrap();
    assert_eq!(outcome.merged, 1);
    assert!(outcome.warnings.is_empty());
    assert_eq!(
        CartService::new(&pool)
            .get(&Owner::User(user))
            .await
            .unwrap()
            .line(product)
            .unwrap()
            .quantity,
        160
    );
}
