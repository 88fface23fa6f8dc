//! The storefront router served over a real socket.
//!
//! Run with: cargo test -p pantry-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;

use pantry_integration_tests::{seed_product, spawn_server};

fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_health(pool: PgPool) {
    let base_url = spawn_server(pool).await;
    let client = client();

    let resp = client.get(format!("{base_url}/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = client
        .get(format!("{base_url}/health/ready"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_guest_cart_round_trip(pool: PgPool) {
    seed_product(&pool, 1, 64_900, 10).await;
    let base_url = spawn_server(pool).await;
    let client = client();

    let resp = client
        .post(format!("{base_url}/session/guest"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let session: Value = resp.json().await.unwrap();
    assert_eq!(session["created"], true);

    // Same session, same guest id
    let again: Value = client
        .post(format!("{base_url}/session/guest"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["created"], false);
    assert_eq!(again["guestSessionId"], session["guestSessionId"]);

    let resp = client
        .post(format!("{base_url}/cart"))
        .json(&json!({ "productId": 1, "quantity": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = client
        .post(format!("{base_url}/cart"))
        .json(&json!({ "productId": 1, "quantity": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["action"], "exists");

    let resp = client
        .patch(format!("{base_url}/cart/1"))
        .json(&json!({ "delta": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let cart: Value = client
        .get(format!("{base_url}/cart"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["items"][0]["quantity"], 3);
    assert_eq!(cart["grandTotal"], 3 * 64_900);

    let count: Value = client
        .get(format!("{base_url}/cart/count"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(count["count"], 3);

    let resp = client
        .delete(format!("{base_url}/cart/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .delete(format!("{base_url}/cart/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_stock_errors_carry_shortage(pool: PgPool) {
    seed_product(&pool, 1, 22_000, 2).await;
    let base_url = spawn_server(pool).await;
    let client = client();
    client
        .post(format!("{base_url}/session/guest"))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{base_url}/cart"))
        .json(&json!({ "productId": 1, "quantity": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "out_of_stock");
    assert_eq!(body["requested"], 5);
    assert_eq!(body["available"], 2);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_identity_is_required(pool: PgPool) {
    let base_url = spawn_server(pool).await;
    let client = client();

    // No guest session yet
    let resp = client.get(format!("{base_url}/cart")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Guests cannot place orders or merge
    client
        .post(format!("{base_url}/session/guest"))
        .send()
        .await
        .unwrap();
    let resp = client
        .post(format!("{base_url}/orders"))
        .json(&json!({
            "shippingAddress": {
                "name": "Asha Rao", "line1": "12 MG Road", "city": "Bengaluru",
                "state": "KA", "postalCode": "560001", "country": "IN"
            },
            "paymentMethod": "cod"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .post(format!("{base_url}/cart/merge"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_webhook_rejects_bad_signature(pool: PgPool) {
    let base_url = spawn_server(pool).await;

    let resp = client()
        .post(format!("{base_url}/payment/webhook"))
        .header("x-gateway-signature", "deadbeef")
        .body(r#"{"event":"payment.captured","payload":{}}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "invalid_signature");
}
