//! Order pricing and stock validation.
//!
//! The storefront reads a snapshot of the owner's cart joined with the
//! current product rows inside a transaction and hands it here. The rules are
//! deliberately free of I/O: whatever they accept is exactly what the
//! transaction goes on to write.

use serde::{Deserialize, Serialize};

use crate::types::{Money, ProductId};

/// A requested quantity that exceeds what is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockShortage {
    pub product_id: ProductId,
    pub requested: i32,
    pub available: i32,
}

impl std::fmt::Display for StockShortage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "product {} has {} available, {} requested",
            self.product_id, self.available, self.requested
        )
    }
}

/// Check a requested quantity against current stock.
///
/// # Errors
///
/// Returns the shortage if `requested > available`.
pub const fn check_stock(
    product_id: ProductId,
    requested: i32,
    available: i32,
) -> Result<(), StockShortage> {
    if requested > available {
        return Err(StockShortage {
            product_id,
            requested,
            available,
        });
    }
    Ok(())
}

/// One cart line joined with the product row as read inside the checkout transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSnapshot {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Money,
    pub stock: i32,
}

/// Why a cart cannot become an order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("insufficient stock: {0}")]
    InsufficientStock(StockShortage),
    #[error("order amount overflows")]
    AmountOverflow,
}

/// A validated order: line prices snapshotted at validation time and the total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub amount: Money,
}

/// A line as it will be written to `order_item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: i32,
    pub price_at_order_time: Money,
}

/// Validate stock for every line and compute the order amount.
///
/// The first shortage (in line order) is reported.
///
/// # Errors
///
/// Returns `PricingError::EmptyCart` for no lines, `InsufficientStock` when any
/// line asks for more than the current stock, and `AmountOverflow` if the total
/// does not fit in an `i64`.
pub fn price_lines(lines: &[LineSnapshot]) -> Result<PricedOrder, PricingError> {
    if lines.is_empty() {
        return Err(PricingError::EmptyCart);
    }

    let mut amount = Money::ZERO;
    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        check_stock(line.product_id, line.quantity, line.stock)
            .map_err(PricingError::InsufficientStock)?;
        let line_total = line
            .unit_price
            .checked_times(line.quantity)
            .ok_or(PricingError::AmountOverflow)?;
        amount = amount
            .checked_add(line_total)
            .ok_or(PricingError::AmountOverflow)?;
        priced.push(PricedLine {
            product_id: line.product_id,
            quantity: line.quantity,
            price_at_order_time: line.unit_price,
        });
    }

    Ok(PricedOrder {
        lines: priced,
        amount,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i32, quantity: i32, price: i64, stock: i32) -> LineSnapshot {
        LineSnapshot {
            product_id: ProductId::new(id),
            quantity,
            unit_price: Money::from_minor(price),
            stock,
        }
    }

    #[test]
    fn test_empty_cart() {
        assert_eq!(price_lines(&[]), Err(PricingError::EmptyCart));
    }

    #[test]
    fn test_amount_is_sum_of_lines() {
        let order = price_lines(&[line(1, 2, 100, 5), line(2, 1, 300, 1)]).unwrap();
        assert_eq!(order.amount, Money::from_minor(500));
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.lines[1].price_at_order_time, Money::from_minor(300));
    }

    #[test]
    fn test_first_shortage_is_reported() {
        let err = price_lines(&[line(1, 2, 100, 5), line(2, 4, 10, 3), line(3, 9, 1, 0)])
            .unwrap_err();
        assert_eq!(
            err,
            PricingError::InsufficientStock(StockShortage {
                product_id: ProductId::new(2),
                requested: 4,
                available: 3,
            })
        );
    }

    #[test]
    fn test_exact_stock_is_enough() {
        assert!(check_stock(ProductId::new(1), 2, 2).is_ok());
        assert!(check_stock(ProductId::new(1), 3, 2).is_err());
    }

    #[test]
    fn test_overflow() {
        assert_eq!(
            price_lines(&[line(1, 2, i64::MAX, 5)]),
            Err(PricingError::AmountOverflow)
        );
    }
}
