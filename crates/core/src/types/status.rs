//! Status enums for carts, orders and payments.
//!
//! Each enum maps to a Postgres enum type in the `storefront` schema when the
//! `postgres` feature is enabled.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which kind of identity owns a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.cart_owner_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    User,
    Guest,
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Guest => write!(f, "guest"),
        }
    }
}

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paid through the external payment gateway.
    Online,
    /// Cash on delivery; finalized synchronously at order placement.
    Cod,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Cod => write!(f, "cod"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "cod" => Ok(Self::Cod),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Order lifecycle as far as payment is concerned.
///
/// ```text
/// Cart -> Validated -> Created -+-> ConfirmedCod        (cash on delivery)
///                               +-> PendingPayment -> Paid (online)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    ConfirmedCod,
    Paid,
}

impl OrderStatus {
    /// Whether stock has been decremented and the cart cleared for this order.
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        matches!(self, Self::ConfirmedCod | Self::Paid)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PendingPayment => write!(f, "pending_payment"),
            Self::ConfirmedCod => write!(f, "confirmed_cod"),
            Self::Paid => write!(f, "paid"),
        }
    }
}

/// Payment row status.
///
/// ```text
/// None -> Created -> Attempted -> Authorized -> Paid
///            |           |            |
///            +-----------+------------+--> Failed
/// PendingCod (cash on delivery, no gateway order)
/// ```
///
/// `Paid` is terminal: nothing may move a payment out of it, and at most one
/// payment per order may ever reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Attempted,
    Authorized,
    Paid,
    Failed,
    PendingCod,
}

impl PaymentStatus {
    /// Whether the gateway order behind this payment can be handed out again
    /// instead of creating a new one.
    #[must_use]
    pub const fn is_reusable(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Attempted | Self::Authorized | Self::Paid
        )
    }

    /// Whether a webhook or verification may move this payment to `to`.
    #[must_use]
    pub const fn can_transition_to(&self, to: Self) -> bool {
        match (self, to) {
            (Self::Paid, _) => false,
            (Self::Created | Self::Attempted, Self::Attempted | Self::Authorized)
            | (Self::Created | Self::Attempted | Self::Authorized | Self::Failed, Self::Paid)
            | (Self::Created | Self::Attempted | Self::Authorized, Self::Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Attempted => write!(f, "attempted"),
            Self::Authorized => write!(f, "authorized"),
            Self::Paid => write!(f, "paid"),
            Self::Failed => write!(f, "failed"),
            Self::PendingCod => write!(f, "pending_cod"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paid_is_terminal() {
        for to in [
            PaymentStatus::Created,
            PaymentStatus::Attempted,
            PaymentStatus::Authorized,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
        ] {
            assert!(!PaymentStatus::Paid.can_transition_to(to));
        }
    }

    #[test]
    fn test_failed_payment_can_still_be_paid() {
        // A customer may retry after a failed attempt on the same gateway order.
        assert!(PaymentStatus::Failed.can_transition_to(PaymentStatus::Paid));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Authorized));
    }

    #[test]
    fn test_reusable_statuses() {
        assert!(PaymentStatus::Created.is_reusable());
        assert!(PaymentStatus::Attempted.is_reusable());
        assert!(PaymentStatus::Paid.is_reusable());
        assert!(!PaymentStatus::Failed.is_reusable());
        assert!(!PaymentStatus::PendingCod.is_reusable());
    }

    #[test]
    fn test_order_status_serde() {
        let json = serde_json::to_string(&OrderStatus::PendingPayment).unwrap_or_default();
        assert_eq!(json, "\"pending_payment\"");
        assert!(OrderStatus::ConfirmedCod.is_finalized());
        assert!(!OrderStatus::PendingPayment.is_finalized());
    }

    #[test]
    fn test_payment_method_from_str() {
        assert_eq!("cod".parse::<PaymentMethod>(), Ok(PaymentMethod::Cod));
        assert!("card".parse::<PaymentMethod>().is_err());
    }
}
