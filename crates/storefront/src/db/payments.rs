//! Payment rows.
//!
//! A payment moves through `created → attempted/authorized → paid | failed`.
//! Writes that move a payment are compare-and-swap updates on the current
//! status, and the `payment_one_paid_per_order` index rejects a second `paid`
//! row for the same order.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

use pantry_core::{Money, OrderId, PaymentId, PaymentMethod, PaymentStatus};

use super::RepositoryError;

/// A payment row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: Money,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

const PAYMENT_COLUMNS: &str = "id, order_id, method, status, amount, gateway_order_id, \
                               gateway_payment_id, recorded_at";

/// The gateway payment for an order that can be handed out again, if any.
///
/// A `paid` payment wins over an open one.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_reusable(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Option<PaymentRecord>, RepositoryError> {
    let record = sqlx::query_as::<_, PaymentRecord>(&format!(
        r"
        SELECT {PAYMENT_COLUMNS}
        FROM storefront.payment
        WHERE order_id = $1
          AND method = 'online'
          AND status IN ('created', 'attempted', 'authorized', 'paid')
        ORDER BY (status = 'paid') DESC, recorded_at DESC, id DESC
        LIMIT 1
        "
    ))
    .bind(order_id)
    .fetch_optional(conn)
    .await?;

    Ok(record)
}

/// Record a freshly created gateway order.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the gateway order id is already recorded.
pub async fn insert_online(
    conn: &mut PgConnection,
    order_id: OrderId,
    amount: Money,
    gateway_order_id: &str,
) -> Result<PaymentRecord, RepositoryError> {
    sqlx::query_as::<_, PaymentRecord>(&format!(
        r"
        INSERT INTO storefront.payment (order_id, method, status, amount, gateway_order_id)
        VALUES ($1, 'online', 'created', $2, $3)
        RETURNING {PAYMENT_COLUMNS}
        "
    ))
    .bind(order_id)
    .bind(amount)
    .bind(gateway_order_id)
    .fetch_one(conn)
    .await
    .map_err(|e| RepositoryError::from_unique(e, "gateway order"))
}

/// Record a cash-on-delivery payment.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_cod(
    conn: &mut PgConnection,
    order_id: OrderId,
    amount: Money,
) -> Result<PaymentRecord, RepositoryError> {
    let record = sqlx::query_as::<_, PaymentRecord>(&format!(
        r"
        INSERT INTO storefront.payment (order_id, method, status, amount)
        VALUES ($1, 'cod', 'pending_cod', $2)
        RETURNING {PAYMENT_COLUMNS}
        "
    ))
    .bind(order_id)
    .bind(amount)
    .fetch_one(conn)
    .await?;

    Ok(record)
}

/// Read a payment by gateway order id without locking.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_gateway_order(
    conn: &mut PgConnection,
    gateway_order_id: &str,
) -> Result<Option<PaymentRecord>, RepositoryError> {
    let record = sqlx::query_as::<_, PaymentRecord>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM storefront.payment WHERE gateway_order_id = $1"
    ))
    .bind(gateway_order_id)
    .fetch_optional(conn)
    .await?;

    Ok(record)
}

/// Read a payment by gateway order id and lock its row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_gateway_order(
    conn: &mut PgConnection,
    gateway_order_id: &str,
) -> Result<Option<PaymentRecord>, RepositoryError> {
    let record = sqlx::query_as::<_, PaymentRecord>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM storefront.payment WHERE gateway_order_id = $1 FOR UPDATE"
    ))
    .bind(gateway_order_id)
    .fetch_optional(conn)
    .await?;

    Ok(record)
}

/// Number of `paid` payments for an order (zero or one).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn count_paid(conn: &mut PgConnection, order_id: OrderId) -> Result<i64, RepositoryError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM storefront.payment WHERE order_id = $1 AND status = 'paid'",
    )
    .bind(order_id)
    .fetch_one(conn)
    .await?;

    Ok(count)
}

/// Move a payment to `paid` unless it already is.
///
/// Returns `false` when the payment was already `paid`, in which case nothing
/// changed.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if another payment of the same order is
/// already `paid`.
pub async fn mark_paid(
    conn: &mut PgConnection,
    id: PaymentId,
    gateway_payment_id: Option<&str>,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE storefront.payment
        SET status = 'paid',
            gateway_payment_id = COALESCE(gateway_payment_id, $2),
            updated_at = NOW()
        WHERE id = $1 AND status <> 'paid'
        ",
    )
    .bind(id)
    .bind(gateway_payment_id)
    .execute(conn)
    .await
    .map_err(|e| RepositoryError::from_unique(e, "paid payment for order"))?;

    Ok(result.rows_affected() == 1)
}

/// Move a payment from `from` to `to`.
///
/// Returns `false` if the payment was no longer in `from`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn compare_and_set_status(
    conn: &mut PgConnection,
    id: PaymentId,
    from: PaymentStatus,
    to: PaymentStatus,
    gateway_payment_id: Option<&str>,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE storefront.payment
        SET status = $3,
            gateway_payment_id = COALESCE(gateway_payment_id, $4),
            updated_at = NOW()
        WHERE id = $1 AND status = $2
        ",
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .bind(gateway_payment_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Fill in the gateway payment id on a payment that has none yet.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn fill_gateway_payment_id(
    conn: &mut PgConnection,
    id: PaymentId,
    gateway_payment_id: &str,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE storefront.payment
        SET gateway_payment_id = $2, updated_at = NOW()
        WHERE id = $1 AND gateway_payment_id IS NULL
        ",
    )
    .bind(id)
    .bind(gateway_payment_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Mark the payment behind a gateway order `failed`, unless it is `paid`
/// (or already `failed`).
///
/// With `order_id` set, only a payment of that order is touched.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn mark_failed(
    conn: &mut PgConnection,
    gateway_order_id: &str,
    order_id: Option<OrderId>,
    gateway_payment_id: Option<&str>,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE storefront.payment
        SET status = 'failed',
            gateway_payment_id = COALESCE(gateway_payment_id, $3),
            updated_at = NOW()
        WHERE gateway_order_id = $1
          AND ($2::INTEGER IS NULL OR order_id = $2)
          AND status IN ('created', 'attempted', 'authorized')
        ",
    )
    .bind(gateway_order_id)
    .bind(order_id)
    .bind(gateway_payment_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// All payments of an order, oldest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_order(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<PaymentRecord>, RepositoryError> {
    let records = sqlx::query_as::<_, PaymentRecord>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM storefront.payment WHERE order_id = $1 ORDER BY id"
    ))
    .bind(order_id)
    .fetch_all(conn)
    .await?;

    Ok(records)
}
