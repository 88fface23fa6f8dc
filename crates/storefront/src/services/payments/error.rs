//! Payment error types.

use thiserror::Error;

use pantry_core::checkout::StockShortage;
use pantry_core::OrderId;

use crate::db::RepositoryError;
use crate::gateway::GatewayError;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The checkout callback signature did not match.
    #[error("invalid payment signature")]
    InvalidSignature,

    /// The webhook body signature did not match.
    #[error("invalid webhook signature")]
    InvalidWebhookSignature,

    /// No payment is recorded for the gateway order.
    #[error("payment record not found for gateway order {0}")]
    PaymentRecordNotFound(String),

    /// The order does not exist.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// The order belongs to another user.
    #[error("order {0} belongs to another user")]
    Forbidden(OrderId),

    /// Cash-on-delivery orders have no gateway order.
    #[error("order {0} is cash on delivery")]
    NotOnlineOrder(OrderId),

    /// Stock ran out between order creation and payment.
    #[error("insufficient stock: {0}")]
    InsufficientStock(StockShortage),

    /// The gateway could not create an order.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PaymentError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}
