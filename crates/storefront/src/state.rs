//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::gateway::{GatewayError, HttpGateway, SignatureVerifier};
use crate::middleware::IdentityCache;
use crate::services::{CartService, CheckoutService, MergeService, PaymentService};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    gateway: HttpGateway,
    verifier: SignatureVerifier,
    identity: IdentityCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the payment gateway HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, GatewayError> {
        let gateway = HttpGateway::new(&config.gateway)?;
        let verifier = SignatureVerifier::new(
            config.gateway.key_secret.clone(),
            config.gateway.webhook_secret.clone(),
        );
        let identity = IdentityCache::new(pool.clone(), config.identity_cache_ttl);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                gateway,
                verifier,
                identity,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the identity cache.
    #[must_use]
    pub fn identity(&self) -> &IdentityCache {
        &self.inner.identity
    }

    /// Cart service bound to the pool.
    #[must_use]
    pub fn cart(&self) -> CartService<'_> {
        CartService::new(self.pool())
    }

    /// Merge service bound to the pool.
    #[must_use]
    pub fn merge(&self) -> MergeService<'_> {
        MergeService::new(self.pool())
    }

    /// Checkout service pricing in the store currency.
    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(self.pool(), self.inner.config.currency)
    }

    /// Payment service using the configured gateway.
    #[must_use]
    pub fn payments(&self) -> PaymentService<'_, HttpGateway> {
        PaymentService::new(
            self.pool(),
            &self.inner.gateway,
            &self.inner.verifier,
            &self.inner.config.gateway.key_id,
        )
    }
}
