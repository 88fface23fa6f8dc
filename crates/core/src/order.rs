//! Order wire types and shipping address validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CurrencyCode, Money, OrderId, OrderStatus, PaymentMethod, ProductId, UserId};

/// Errors in a shipping address, reported before any database access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("postal code contains invalid characters")]
    InvalidPostalCode,
}

/// Where an order ships to. Stored as JSONB on the order row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ShippingAddress {
    const MAX_FIELD: usize = 200;

    /// Validate the address shape.
    ///
    /// # Errors
    ///
    /// Returns `AddressError` for blank required fields, overlong fields, or a
    /// postal code with characters other than alphanumerics, spaces and dashes.
    pub fn validate(&self) -> Result<(), AddressError> {
        let required = [
            ("name", &self.name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(AddressError::Missing(field));
            }
            if value.len() > Self::MAX_FIELD {
                return Err(AddressError::TooLong {
                    field,
                    max: Self::MAX_FIELD,
                });
            }
        }

        for (field, value) in [("line2", &self.line2), ("phone", &self.phone)] {
            if value.as_ref().is_some_and(|v| v.len() > Self::MAX_FIELD) {
                return Err(AddressError::TooLong {
                    field,
                    max: Self::MAX_FIELD,
                });
            }
        }

        if !self
            .postal_code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
        {
            return Err(AddressError::InvalidPostalCode);
        }

        Ok(())
    }
}

/// Request body of `POST /orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

/// An order line with the price snapshotted when the order was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    pub product_id: ProductId,
    pub quantity: i32,
    pub price_at_order_time: Money,
}

/// An order as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub currency: CurrencyCode,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLineView>,
}

/// Response body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub order: OrderView,
    pub status: OrderStatus,
}
