//! Integration tests for Pantry.
//!
//! # Running Tests
//!
//! ```bash
//! # Start a database the test user may create databases on
//! docker run -d -p 5432:5432 -e POSTGRES_PASSWORD=postgres postgres:17
//!
//! # Run integration tests (each test gets a fresh migrated database)
//! DATABASE_URL=postgres://... cargo test -p pantry-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_store` - cart CRUD against the real schema
//! - `cart_merge` - guest to user merge
//! - `checkout` - order placement and stock under contention
//! - `payments` - gateway order reuse, verify, webhooks, exactly-once finalize
//! - `http` - the router served over a real socket
//!
//! The helpers here stand in for the outside world: a fake payment gateway,
//! signing keys, and catalog/user fixtures.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use secrecy::SecretString;
use sqlx::PgPool;

use pantry_core::cart::ProductSummary;
use pantry_core::order::ShippingAddress;
use pantry_core::{CurrencyCode, Money, ProductId, UserId};
use pantry_storefront::config::{PaymentGatewayConfig, StorefrontConfig};
use pantry_storefront::db::{self, UserRepository};
use pantry_storefront::gateway::{
    GatewayError, GatewayOrder, GatewayOrderRequest, PaymentGateway, SignatureVerifier,
};
use pantry_storefront::state::AppState;

/// Key id handed to the checkout widget in tests.
pub const KEY_ID: &str = "key_test";

const KEY_SECRET: &str = "test-key-secret-0123456789abcdef";
const WEBHOOK_SECRET: &str = "test-webhook-secret-0123456789ab";

/// Signature verifier keyed with the test secrets.
#[must_use]
pub fn verifier() -> SignatureVerifier {
    SignatureVerifier::new(
        SecretString::from(KEY_SECRET),
        SecretString::from(WEBHOOK_SECRET),
    )
}

/// In-process gateway that mints sequential order ids.
#[derive(Debug, Default)]
pub struct FakeGateway {
    created: AtomicU32,
    delay: Option<Duration>,
}

impl FakeGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that takes `delay` to answer, widening race windows.
    #[must_use]
    pub const fn slow(delay: Duration) -> Self {
        Self {
            created: AtomicU32::new(0),
            delay: Some(delay),
        }
    }

    /// How many gateway orders were created.
    #[must_use]
    pub fn created(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }
}

impl PaymentGateway for FakeGateway {
    async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(GatewayOrder {
            id: format!("order_fake_{}_{n}", request.receipt),
            amount: request.amount,
            currency: request.currency,
        })
    }
}

/// Insert or update a catalog product.
///
/// # Panics
///
/// Panics if the database write fails.
#[allow(clippy::unwrap_used)]
pub async fn seed_product(pool: &PgPool, id: i32, price: i64, stock: i32) -> ProductId {
    let product = ProductSummary {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        price: Money::from_minor(price),
        stock,
    };
    let mut conn = pool.acquire().await.unwrap();
    db::products::upsert(&mut conn, &product).await.unwrap();
    product.id
}

/// Current stock of a product.
///
/// # Panics
///
/// Panics if the query fails or the product is missing.
#[allow(clippy::unwrap_used)]
pub async fn stock_of(pool: &PgPool, id: ProductId) -> i32 {
    let mut conn = pool.acquire().await.unwrap();
    db::products::stock(&mut conn, id).await.unwrap().unwrap()
}

/// Create a user with the given email.
///
/// # Panics
///
/// Panics if the insert fails.
#[allow(clippy::unwrap_used)]
pub async fn create_user(pool: &PgPool, email: &str) -> UserId {
    UserRepository::new(pool).create(email).await.unwrap()
}

/// A valid shipping address.
#[must_use]
pub fn address() -> ShippingAddress {
    ShippingAddress {
        name: "Asha Rao".to_string(),
        line1: "12 MG Road".to_string(),
        line2: None,
        city: "Bengaluru".to_string(),
        state: "KA".to_string(),
        postal_code: "560001".to_string(),
        country: "IN".to_string(),
        phone: Some("+919800000000".to_string()),
    }
}

/// Storefront configuration pointing at the test secrets.
#[must_use]
pub fn config(base_url: &str) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://unused"),
        host: Ipv4Addr::LOCALHOST.into(),
        port: 0,
        base_url: base_url.to_string(),
        session_secret: SecretString::from("test-session-secret-0123456789abcdef"),
        currency: CurrencyCode::INR,
        identity_cache_ttl: Duration::from_secs(30),
        gateway: PaymentGatewayConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            key_id: KEY_ID.to_string(),
            key_secret: SecretString::from(KEY_SECRET),
            webhook_secret: SecretString::from(WEBHOOK_SECRET),
            timeout: Duration::from_secs(1),
        },
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Serve the storefront on an ephemeral port, returning its base URL.
///
/// # Panics
///
/// Panics if the listener cannot bind or the state cannot be built.
#[allow(clippy::unwrap_used)]
pub async fn spawn_server(pool: PgPool) -> String {
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let state = AppState::new(config(&base_url), pool).unwrap();
    let app = pantry_storefront::app(state);
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .ok();
    });

    base_url
}
