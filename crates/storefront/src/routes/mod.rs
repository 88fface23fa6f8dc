//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                 - Liveness
//! GET    /health/ready           - Readiness (database reachable)
//!
//! # Session
//! POST   /session/guest          - Start (or return) the guest session
//!
//! # Cart (user or guest)
//! GET    /cart                   - Cart with current prices and totals
//! POST   /cart                   - Add a line (201 created / 200 exists)
//! DELETE /cart                   - Clear the cart
//! GET    /cart/count             - Sum of quantities
//! POST   /cart/merge             - Merge the guest cart after sign-in
//! PATCH  /cart/{productId}       - Set or adjust a quantity
//! DELETE /cart/{productId}       - Remove a line
//!
//! # Orders (signed-in user)
//! POST   /orders                 - Place an order from the cart
//! GET    /orders/{orderId}       - Read an order
//!
//! # Payments
//! POST   /payment/create-order   - Create or reuse a gateway order
//! POST   /payment/verify         - Verify the checkout callback (rate limited)
//! POST   /payment/webhook        - Gateway deliveries (signature auth)
//! ```

pub mod cart;
pub mod orders;
pub mod payment;
pub mod session;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
};

use crate::middleware::{api_rate_limiter, payment_rate_limiter};
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add).delete(cart::clear))
        .route("/count", get(cart::count))
        .route("/merge", post(cart::merge))
        .route(
            "/{product_id}",
            patch(cart::update).delete(cart::remove),
        )
        .layer(api_rate_limiter())
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::place))
        .route("/{order_id}", get(orders::show))
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/verify",
            post(payment::verify).layer(payment_rate_limiter()),
        )
        .route("/create-order", post(payment::create_order))
        .route("/webhook", post(payment::webhook))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/session/guest", post(session::guest))
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/payment", payment_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
