//! Unified error handling with Sentry integration.
//!
//! Every route handler returns `Result<T, AppError>`. Service errors convert
//! into `AppError` with `?` and are mapped to a status code and a JSON body
//! `{ error, code }` here. Stock failures additionally carry the limiting
//! quantities. Server-side failures are captured to Sentry before responding
//! and their details are never sent to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use pantry_core::cart::StockErrorBody;
use pantry_core::checkout::StockShortage;

use crate::db::RepositoryError;
use crate::gateway::GatewayError;
use crate::services::{CartError, CheckoutError, MergeError, PaymentError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Guest cart merge failed.
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    /// Order placement or lookup failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Payment operation failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Malformed request.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No identity on the request.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Identity present but not the owner.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session: {err}"))
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: String,
    code: &'a str,
}

/// How an error is presented to the client.
struct Classified {
    status: StatusCode,
    code: &'static str,
    /// `None` hides the error text behind a generic message.
    message: Option<String>,
    shortage: Option<StockShortage>,
}

impl Classified {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: Some(message.into()),
            shortage: None,
        }
    }

    const fn hidden(status: StatusCode, code: &'static str) -> Self {
        Self {
            status,
            code,
            message: None,
            shortage: None,
        }
    }

    fn stock(code: &'static str, message: String, shortage: &StockShortage) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            code,
            message: Some(message),
            shortage: Some(shortage.clone()),
        }
    }
}

fn classify_repository(err: &RepositoryError) -> Classified {
    match err {
        RepositoryError::NotFound => Classified::new(StatusCode::NOT_FOUND, "not_found", "Not found"),
        RepositoryError::Conflict(what) => Classified::new(
            StatusCode::CONFLICT,
            "conflict",
            format!("Conflicting update: {what}"),
        ),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            Classified::hidden(StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    }
}

fn classify_gateway(err: &GatewayError) -> Classified {
    match err {
        GatewayError::Timeout => Classified::hidden(StatusCode::BAD_GATEWAY, "gateway_timeout"),
        _ => Classified::hidden(StatusCode::BAD_GATEWAY, "gateway_error"),
    }
}

impl AppError {
    fn classify(&self) -> Classified {
        match self {
            Self::Cart(err) => match err {
                CartError::Validation(e) => {
                    Classified::new(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
                }
                CartError::ProductNotFound(_) | CartError::LineNotFound(_) => {
                    Classified::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
                }
                CartError::OutOfStock(shortage) => {
                    Classified::stock("out_of_stock", err.to_string(), shortage)
                }
                CartError::Repository(e) => classify_repository(e),
            },
            Self::Merge(MergeError::Repository(e)) | Self::Database(e) => classify_repository(e),
            Self::Checkout(err) => match err {
                CheckoutError::InvalidAddress(e) => {
                    Classified::new(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
                }
                CheckoutError::EmptyCart => {
                    Classified::new(StatusCode::BAD_REQUEST, "empty_cart", "Cart is empty")
                }
                CheckoutError::InsufficientStock(shortage) => {
                    Classified::stock("insufficient_stock", err.to_string(), shortage)
                }
                CheckoutError::AmountOverflow => Classified::new(
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    "Order total is too large",
                ),
                CheckoutError::OrderNotFound(_) => {
                    Classified::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
                }
                CheckoutError::Forbidden(_) => {
                    Classified::new(StatusCode::FORBIDDEN, "forbidden", "Order belongs to another user")
                }
                CheckoutError::Repository(e) => classify_repository(e),
            },
            Self::Payment(err) => match err {
                PaymentError::InvalidSignature => Classified::new(
                    StatusCode::BAD_REQUEST,
                    "invalid_signature",
                    "Invalid payment signature",
                ),
                PaymentError::InvalidWebhookSignature => Classified::new(
                    StatusCode::BAD_REQUEST,
                    "invalid_signature",
                    "Invalid webhook signature",
                ),
                PaymentError::PaymentRecordNotFound(_) | PaymentError::OrderNotFound(_) => {
                    Classified::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
                }
                PaymentError::Forbidden(_) => {
                    Classified::new(StatusCode::FORBIDDEN, "forbidden", "Order belongs to another user")
                }
                PaymentError::NotOnlineOrder(_) => {
                    Classified::new(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
                }
                PaymentError::InsufficientStock(shortage) => {
                    Classified::stock("insufficient_stock", err.to_string(), shortage)
                }
                PaymentError::Gateway(e) => classify_gateway(e),
                PaymentError::Repository(e) => classify_repository(e),
            },
            Self::Validation(msg) => {
                Classified::new(StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            Self::Unauthorized(msg) => {
                Classified::new(StatusCode::UNAUTHORIZED, "unauthorized", msg.clone())
            }
            Self::Forbidden(msg) => Classified::new(StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            Self::NotFound(msg) => Classified::new(StatusCode::NOT_FOUND, "not_found", msg.clone()),
            Self::RateLimited => Classified::new(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests",
            ),
            Self::Internal(_) => Classified::hidden(StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let classified = self.classify();

        // Capture server and upstream errors to Sentry
        if classified.status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                code = classified.code,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, code = classified.code, "Request rejected");
        }

        // Don't expose internal error details to clients
        let message = classified.message.unwrap_or_else(|| {
            if classified.status == StatusCode::BAD_GATEWAY {
                "Payment gateway unavailable".to_string()
            } else {
                "Internal server error".to_string()
            }
        });

        match classified.shortage {
            Some(shortage) => (
                classified.status,
                Json(StockErrorBody {
                    error: message,
                    code: classified.code.to_string(),
                    shortage,
                }),
            )
                .into_response(),
            None => (
                classified.status,
                Json(ErrorBody {
                    error: message,
                    code: classified.code,
                }),
            )
                .into_response(),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Called when a request's session resolves to a signed-in user.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Merged guest cart", Some(&[("items", "3")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use pantry_core::cart::QuantityError;
    use pantry_core::{OrderId, ProductId};

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_json(err: AppError) -> serde_json::Value {
        let body = err.into_response().into_body().collect().await.unwrap();
        serde_json::from_slice(&body.to_bytes()).unwrap()
    }

    fn shortage() -> StockShortage {
        StockShortage {
            product_id: ProductId::new(1),
            requested: 3,
            available: 2,
        }
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 7".to_string());
        assert_eq!(err.to_string(), "Not found: order 7");

        let err = AppError::Validation("bad quantity".to_string());
        assert_eq!(err.to_string(), "Validation error: bad quantity");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(CartError::Validation(QuantityError::ZeroDelta).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CartError::LineNotFound(ProductId::new(1)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CheckoutError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::Forbidden(OrderId::new(1)).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(PaymentError::InvalidSignature.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(PaymentError::Gateway(GatewayError::Timeout).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(RepositoryError::Conflict("cart line".to_string()).into()),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_stock_error_carries_quantities() {
        let body = body_json(CartError::OutOfStock(shortage()).into()).await;
        assert_eq!(body["code"], "out_of_stock");
        assert_eq!(body["productId"], 1);
        assert_eq!(body["requested"], 3);
        assert_eq!(body["available"], 2);

        let body = body_json(CheckoutError::InsufficientStock(shortage()).into()).await;
        assert_eq!(body["code"], "insufficient_stock");
        assert_eq!(body["available"], 2);
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let body = body_json(AppError::Internal("pool exhausted".to_string())).await;
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["code"], "internal");

        let body = body_json(
            RepositoryError::DataCorruption("bad currency XYZ".to_string()).into(),
        )
        .await;
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_gateway_timeout_code() {
        let body = body_json(PaymentError::Gateway(GatewayError::Timeout).into()).await;
        assert_eq!(body["code"], "gateway_timeout");
        assert_eq!(body["error"], "Payment gateway unavailable");
    }
}
