//! Cart wire types and quantity rules.
//!
//! These are the JSON shapes exchanged between the storefront cart API and the
//! client cache, plus the small rules both sides apply to quantities.

use serde::{Deserialize, Serialize};

use crate::checkout::StockShortage;
use crate::merge::MergeWarning;
use crate::types::{Money, ProductId};

/// Product fields shown next to a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    /// Current catalog price (not a snapshot).
    pub price: Money,
    /// Current available stock.
    pub stock: i32,
}

/// One cart line enriched with the current product price and stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub product_id: ProductId,
    pub quantity: i32,
    pub product: ProductSummary,
    /// `quantity × product.price`.
    pub item_total: Money,
}

impl CartItemView {
    /// Build a line view, computing the line total from the current price.
    ///
    /// Saturates instead of overflowing; an overflowing line can never pass
    /// checkout validation anyway.
    #[must_use]
    pub fn new(quantity: i32, product: ProductSummary) -> Self {
        let item_total = product
            .price
            .checked_times(quantity)
            .unwrap_or(Money::from_minor(i64::MAX));
        Self {
            product_id: product.id,
            quantity,
            product,
            item_total,
        }
    }
}

/// Response body of `GET /cart`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub grand_total: Money,
}

impl CartView {
    /// Build a cart view, summing line totals.
    #[must_use]
    pub fn from_items(items: Vec<CartItemView>) -> Self {
        let grand_total = items
            .iter()
            .fold(Money::ZERO, |acc, item| {
                acc.checked_add(item.item_total)
                    .unwrap_or(Money::from_minor(i64::MAX))
            });
        Self { items, grand_total }
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|item| i64::from(item.quantity)).sum()
    }

    /// Find the line for a product.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartItemView> {
        self.items.iter().find(|item| item.product_id == product_id)
    }
}

/// Outcome tag carried by every cart mutation response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartAction {
    Created,
    Exists,
    Updated,
    Deleted,
    Cleared,
    Merged,
}

/// Request body of `POST /cart`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i32>,
}

/// Response body of `POST /cart`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartResponse {
    pub action: CartAction,
    pub item: CartItemView,
}

/// Request body of `PATCH /cart/{productId}`: exactly one of `quantity` or `delta`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i32>,
}

/// Response body of `PATCH /cart/{productId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartResponse {
    pub action: CartAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<CartItemView>,
}

/// Response body of `DELETE /cart/{productId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartResponse {
    pub action: CartAction,
    pub product_id: ProductId,
}

/// Response body of `DELETE /cart`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearCartResponse {
    pub action: CartAction,
    pub removed: u64,
}

/// Response body of `POST /cart/merge`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCartResponse {
    pub action: CartAction,
    pub items_count: usize,
    #[serde(default)]
    pub warnings: Vec<MergeWarning>,
}

/// Response body of `GET /cart/count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCountResponse {
    pub count: i64,
}

/// Body returned with a 409 when a requested quantity exceeds stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockErrorBody {
    pub error: String,
    pub code: String,
    #[serde(flatten)]
    pub shortage: StockShortage,
}

/// A quantity rejected before touching the database.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    #[error("quantity must be at least {min} (got {got})")]
    BelowMinimum { got: i32, min: i32 },
    #[error("exactly one of quantity or delta is required")]
    Ambiguous,
    #[error("delta must not be zero")]
    ZeroDelta,
}

/// A requested change to an existing line's quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// Replace the quantity; zero or less deletes the line.
    Set(i32),
    /// Add to the current quantity; a result of zero or less deletes the line.
    Delta(i32),
}

impl QuantityChange {
    /// The quantity after applying this change to `current`.
    #[must_use]
    pub const fn apply(self, current: i32) -> i32 {
        match self {
            Self::Set(quantity) => quantity,
            Self::Delta(delta) => current.saturating_add(delta),
        }
    }
}

impl UpdateCartRequest {
    /// Validate the request shape.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError` if neither or both fields are set, or if `delta`
    /// is zero. Any `quantity` is accepted: zero or less deletes the line and
    /// the upper bound is the product's stock, checked in the transaction.
    pub const fn change(&self) -> Result<QuantityChange, QuantityError> {
        match (self.quantity, self.delta) {
            (Some(quantity), None) => Ok(QuantityChange::Set(quantity)),
            (None, Some(0)) => Err(QuantityError::ZeroDelta),
            (None, Some(delta)) => Ok(QuantityChange::Delta(delta)),
            _ => Err(QuantityError::Ambiguous),
        }
    }
}

/// Validate the quantity of an add request, defaulting to one.
///
/// # Errors
///
/// Returns `QuantityError::BelowMinimum` for a quantity below one. The upper
/// bound is the product's stock.
pub fn add_quantity(requested: Option<i32>) -> Result<i32, QuantityError> {
    let quantity = requested.unwrap_or(1);
    if quantity < 1 {
        return Err(QuantityError::BelowMinimum {
            got: quantity,
            min: 1,
        });
    }
    Ok(quantity)
}
