//! Order placement and stock under contention.
//!
//! Run with: cargo test -p pantry-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use sqlx::PgPool;

use pantry_core::cart::AddToCartRequest;
use pantry_core::order::PlaceOrderRequest;
use pantry_core::{CurrencyCode, OrderStatus, Owner, PaymentMethod, PaymentStatus, ProductId, UserId};
use pantry_integration_tests::{address, create_user, seed_product, stock_of};
use pantry_storefront::db;
use pantry_storefront::services::{CartService, CheckoutError, CheckoutService};

async fn fill_cart(pool: &PgPool, user: UserId, lines: &[(ProductId, i32)]) {
    let cart = CartService::new(pool);
    for &(product_id, quantity) in lines {
        cart.add(
            &Owner::User(user),
            &AddToCartRequest {
                product_id,
                quantity: Some(quantity),
            },
        )
        .await
        .unwrap();
    }
}

fn request(payment_method: PaymentMethod) -> PlaceOrderRequest {
    PlaceOrderRequest {
        shipping_address: address(),
        payment_method,
    }
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_cod_order_finalizes_immediately(pool: PgPool) {
    let rice = seed_product(&pool, 1, 64_900, 10).await;
    let dal = seed_product(&pool, 2, 15_900, 10).await;
    let user = create_user(&pool, "cod@example.com").await;
    fill_cart(&pool, user, &[(rice, 2), (dal, 1)]).await;

    let order = CheckoutService::new(&pool, CurrencyCode::INR)
        .place_order(user, &request(PaymentMethod::Cod))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::ConfirmedCod);
    assert_eq!(order.amount.minor(), 2 * 64_900 + 15_900);
    assert_eq!(order.lines.len(), 2);
    assert_eq!(stock_of(&pool, rice).await, 8);
    assert_eq!(stock_of(&pool, dal).await, 9);
    assert_eq!(
        CartService::new(&pool).count(&Owner::User(user)).await.unwrap(),
        0
    );

    let mut conn = pool.acquire().await.unwrap();
    let payments = db::payments::list_for_order(&mut conn, order.order_id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments.first().unwrap().status, PaymentStatus::PendingCod);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_online_order_leaves_stock_and_cart(pool: PgPool) {
    let rice = seed_product(&pool, 1, 64_900, 10).await;
    let user = create_user(&pool, "online@example.com").await;
    fill_cart(&pool, user, &[(rice, 3)]).await;

    let order = CheckoutService::new(&pool, CurrencyCode::INR)
        .place_order(user, &request(PaymentMethod::Online))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(stock_of(&pool, rice).await, 10);
    assert_eq!(
        CartService::new(&pool).count(&Owner::User(user)).await.unwrap(),
        3
    );
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_prices_are_snapshotted(pool: PgPool) {
    let rice = seed_product(&pool, 1, 50_000, 10).await;
    let user = create_user(&pool, "snapshot@example.com").await;
    fill_cart(&pool, user, &[(rice, 1)]).await;

    let checkout = CheckoutService::new(&pool, CurrencyCode::INR);
    let order = checkout
        .place_order(user, &request(PaymentMethod::Online))
        .await
        .unwrap();

    seed_product(&pool, 1, 99_000, 10).await;
    let reread = checkout.get_order(user, order.order_id).await.unwrap();
    assert_eq!(reread.amount.minor(), 50_000);
    assert_eq!(reread.lines.first().unwrap().price_at_order_time.minor(), 50_000);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_empty_cart_and_bad_address_are_rejected(pool: PgPool) {
    let user = create_user(&pool, "empty@example.com").await;
    let checkout = CheckoutService::new(&pool, CurrencyCode::INR);

    let err = checkout
        .place_order(user, &request(PaymentMethod::Cod))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));

    let mut bad = request(PaymentMethod::Cod);
    bad.shipping_address.postal_code = String::new();
    let err = checkout.place_order(user, &bad).await.unwrap_err();
    assert!(matches!(err, CheckoutError::InvalidAddress(_)));
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_order_of_another_user_is_forbidden(pool: PgPool) {
    let rice = seed_product(&pool, 1, 100, 10).await;
    let owner = create_user(&pool, "owner@example.com").await;
    let stranger = create_user(&pool, "stranger@example.com").await;
    fill_cart(&pool, owner, &[(rice, 1)]).await;

    let checkout = CheckoutService::new(&pool, CurrencyCode::INR);
    let order = checkout
        .place_order(owner, &request(PaymentMethod::Online))
        .await
        .unwrap();

    assert!(matches!(
        checkout.get_order(stranger, order.order_id).await,
        Err(CheckoutError::Forbidden(_))
    ));
}

/// Two shoppers hold the last two units; only one COD checkout can win.
#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_last_units_go_to_one_buyer(pool: PgPool) {
    let mango = seed_product(&pool, 1, 22_000, 2).await;
    let a = create_user(&pool, "a@example.com").await;
    let b = create_user(&pool, "b@example.com").await;
    fill_cart(&pool, a, &[(mango, 2)]).await;
    fill_cart(&pool, b, &[(mango, 2)]).await;

    let mut tasks = tokio::task::JoinSet::new();
    for user in [a, b] {
        let pool = pool.clone();
        tasks.spawn(async move {
            CheckoutService::new(&pool, CurrencyCode::INR)
                .place_order(user, &request(PaymentMethod::Cod))
                .await
        });
    }

    let mut placed = 0;
    let mut short = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => placed += 1,
            Err(CheckoutError::InsufficientStock(shortage)) => {
                assert_eq!(shortage.product_id, mango);
                assert_eq!(shortage.available, 0);
                short += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!((placed, short), (1, 1));
    assert_eq!(stock_of(&pool, mango).await, 0);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_stock_never_goes_negative(pool: PgPool) {
    let oil = seed_product(&pool, 1, 28_500, 5).await;
    let mut users = Vec::new();
    for n in 0..10 {
        let user = create_user(&pool, &format!("buyer{n}@example.com")).await;
        fill_cart(&pool, user, &[(oil, 1)]).await;
        users.push(user);
    }

    let mut tasks = tokio::task::JoinSet::new();
    for user in users {
        let pool = pool.clone();
        tasks.spawn(async move {
            CheckoutService::new(&pool, CurrencyCode::INR)
                .place_order(user, &request(PaymentMethod::Cod))
                .await
        });
    }

    let mut placed = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => placed += 1,
            Err(CheckoutError::InsufficientStock(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(placed, 5);
    assert_eq!(stock_of(&pool, oil).await, 0);
}
