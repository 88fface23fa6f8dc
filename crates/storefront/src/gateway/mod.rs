//! External payment gateway.
//!
//! The gateway is an HTTP service: the storefront asks it to create a gateway
//! order for an amount, the customer pays in the gateway's checkout widget,
//! and the gateway reports back twice. Once through the browser (a signed
//! callback posted to `/payment/verify`) and once server-to-server (a signed
//! webhook). The signature rules live in [`signature`], the webhook body in
//! [`webhook`].

pub mod signature;
pub mod webhook;

use std::future::Future;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use pantry_core::{CurrencyCode, Money, OrderId};

use crate::config::PaymentGatewayConfig;

pub use signature::SignatureVerifier;

/// Errors from the payment gateway API.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request did not complete within the configured timeout.
    #[error("gateway request timed out")]
    Timeout,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway rejected the request.
    #[error("gateway returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The gateway answered with something we could not use.
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// A request to create a gateway order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrderRequest {
    pub amount: Money,
    pub currency: CurrencyCode,
    /// Our order id, echoed back by the gateway as the receipt.
    pub receipt: OrderId,
}

/// A gateway order as created by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: Money,
    pub currency: CurrencyCode,
}

/// The slice of the gateway API the storefront uses.
pub trait PaymentGateway: Send + Sync + 'static {
    /// Create a gateway order.
    fn create_order(
        &self,
        request: GatewayOrderRequest,
    ) -> impl Future<Output = Result<GatewayOrder, GatewayError>> + Send;
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: String,
}

#[derive(Debug, Deserialize)]
struct CreateOrderReply {
    id: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    status: Option<String>,
}

/// `reqwest` client for the gateway's REST API.
///
/// Authenticates with HTTP basic auth (key id and key secret).
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: SecretString,
}

impl HttpGateway {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Http` if the HTTP client cannot be built.
    pub fn new(config: &PaymentGatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }
}

impl PaymentGateway for HttpGateway {
    #[instrument(skip(self), fields(order_id = %request.receipt))]
    async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
        let body = CreateOrderBody {
            amount: request.amount.minor(),
            currency: request.currency.code(),
            receipt: request.receipt.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let response_text = response.text().await.map_err(map_send_error)?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Payment gateway returned non-success status"
            );
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body: response_text.chars().take(200).collect(),
            });
        }

        let reply: CreateOrderReply = serde_json::from_str(&response_text)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let currency = reply
            .currency
            .parse::<CurrencyCode>()
            .map_err(GatewayError::InvalidResponse)?;
        if reply.amount != request.amount.minor() || currency != request.currency {
            return Err(GatewayError::InvalidResponse(format!(
                "gateway order {} is for {} {}, expected {} {}",
                reply.id,
                reply.amount,
                currency,
                request.amount.minor(),
                request.currency
            )));
        }

        tracing::info!(
            gateway_order_id = %reply.id,
            gateway_status = reply.status.as_deref().unwrap_or("unknown"),
            "Created gateway order"
        );

        Ok(GatewayOrder {
            id: reply.id,
            amount: request.amount,
            currency,
        })
    }
}

fn map_send_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Http(err)
    }
}
