//! Cart-to-order pipeline.
//!
//! `Cart → Validated → Created → { COD: ConfirmedCod | Online: PendingPayment }`.
//! Validation and creation share one transaction holding the product row
//! locks, so stock cannot change between the check and the write. Cash on
//! delivery also finalizes in that transaction; online orders wait for
//! payment reconciliation.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use pantry_core::checkout::{PricingError, StockShortage, price_lines};
use pantry_core::order::{AddressError, OrderView, PlaceOrderRequest};
use pantry_core::{CurrencyCode, OrderId, OrderStatus, Owner, PaymentMethod, UserId};

use crate::db::orders::NewOrder;
use crate::db::{self, RepositoryError};

/// Errors from placing or reading orders.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The shipping address failed validation.
    #[error("invalid shipping address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// The cart has no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// A line asks for more than the current stock.
    #[error("insufficient stock: {0}")]
    InsufficientStock(StockShortage),

    /// The order total does not fit in the amount column.
    #[error("order amount overflows")]
    AmountOverflow,

    /// The order does not exist.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// The order belongs to another user.
    #[error("order {0} belongs to another user")]
    Forbidden(OrderId),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

impl From<PricingError> for CheckoutError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::EmptyCart => Self::EmptyCart,
            PricingError::InsufficientStock(shortage) => Self::InsufficientStock(shortage),
            PricingError::AmountOverflow => Self::AmountOverflow,
        }
    }
}

/// Order pipeline service.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    currency: CurrencyCode,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service pricing orders in `currency`.
    #[must_use]
    pub const fn new(pool: &'a PgPool, currency: CurrencyCode) -> Self {
        Self { pool, currency }
    }

    /// Turn the user's cart into an order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidAddress` before any database access,
    /// `CheckoutError::EmptyCart` or `CheckoutError::InsufficientStock` when
    /// the cart cannot be ordered. Nothing is written on error.
    #[instrument(skip(self, request), fields(user_id = %user_id, method = %request.payment_method))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        request: &PlaceOrderRequest,
    ) -> Result<OrderView, CheckoutError> {
        request.shipping_address.validate()?;
        let owner = Owner::User(user_id);

        let mut tx = self.pool.begin().await?;

        let snapshot = db::cart::lock_for_checkout(&mut tx, &owner).await?;
        let priced = price_lines(&snapshot)?;

        let status = match request.payment_method {
            PaymentMethod::Cod => OrderStatus::ConfirmedCod,
            PaymentMethod::Online => OrderStatus::PendingPayment,
        };
        let order = db::orders::insert(
            &mut tx,
            NewOrder {
                user_id,
                amount: priced.amount,
                currency: self.currency,
                status,
                payment_method: request.payment_method,
                shipping_address: &request.shipping_address,
            },
            &priced.lines,
        )
        .await?;

        if request.payment_method == PaymentMethod::Cod {
            for line in &priced.lines {
                if !db::products::decrement_stock(&mut tx, line.product_id, line.quantity).await? {
                    let available = db::products::stock(&mut tx, line.product_id)
                        .await?
                        .unwrap_or(0);
                    return Err(CheckoutError::InsufficientStock(StockShortage {
                        product_id: line.product_id,
                        requested: line.quantity,
                        available,
                    }));
                }
            }
            db::cart::clear(&mut tx, &owner).await?;
            db::payments::insert_cod(&mut tx, order.id, order.amount).await?;
        }

        let lines = db::orders::lines(&mut tx, order.id).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            amount = order.amount.minor(),
            status = %order.status,
            "Placed order"
        );
        Ok(order.into_view(lines))
    }

    /// Read one of the user's orders.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` or `CheckoutError::Forbidden`.
    #[instrument(skip(self), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn get_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<OrderView, CheckoutError> {
        let mut conn = self.pool.acquire().await?;
        let order = db::orders::view(&mut conn, order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))?;
        if order.user_id != user_id {
            return Err(CheckoutError::Forbidden(order_id));
        }
        Ok(order)
    }
}
