//! Payment wire types.

use serde::{Deserialize, Serialize};

use crate::order::OrderView;
use crate::types::{CurrencyCode, Money, OrderId};

/// Request body of `POST /payment/create-order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGatewayOrderRequest {
    pub order_id: OrderId,
}

/// Response body of `POST /payment/create-order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGatewayOrderResponse {
    pub gateway_order_id: String,
    pub amount: Money,
    pub currency: CurrencyCode,
    /// Public key id the checkout widget needs to open the gateway order.
    pub key_id: String,
    /// True when an existing gateway order was handed out again.
    pub reused: bool,
}

/// Request body of `POST /payment/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
    pub order_id: OrderId,
}

/// Response body of a successful `POST /payment/verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub order: OrderView,
    /// True when an earlier call or webhook had already finalized the order.
    pub already_finalized: bool,
}
