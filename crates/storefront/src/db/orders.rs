//! Order and order line rows.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection};

use pantry_core::checkout::PricedLine;
use pantry_core::order::{OrderLineView, OrderView, ShippingAddress};
use pantry_core::{CurrencyCode, Money, OrderId, OrderStatus, PaymentMethod, ProductId, UserId};

use super::RepositoryError;

/// An order row without its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub currency: CurrencyCode,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
    pub created_at: DateTime<Utc>,
}

impl OrderRecord {
    /// Attach lines to build the API view.
    #[must_use]
    pub fn into_view(self, lines: Vec<OrderLineView>) -> OrderView {
        OrderView {
            order_id: self.id,
            user_id: self.user_id,
            amount: self.amount,
            currency: self.currency,
            status: self.status,
            payment_method: self.payment_method,
            shipping_address: self.shipping_address,
            created_at: self.created_at,
            lines,
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    amount: Money,
    currency: String,
    status: OrderStatus,
    payment_method: PaymentMethod,
    shipping_address: Json<ShippingAddress>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for OrderRecord {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let currency = row.currency.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid currency on order {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            currency,
            status: row.status,
            payment_method: row.payment_method,
            shipping_address: row.shipping_address.0,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderLineRow {
    product_id: ProductId,
    quantity: i32,
    price_at_order_time: Money,
}

impl From<OrderLineRow> for OrderLineView {
    fn from(row: OrderLineRow) -> Self {
        Self {
            product_id: row.product_id,
            quantity: row.quantity,
            price_at_order_time: row.price_at_order_time,
        }
    }
}

/// Fields of a new order.
#[derive(Debug, Clone, Copy)]
pub struct NewOrder<'a> {
    pub user_id: UserId,
    pub amount: Money,
    pub currency: CurrencyCode,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: &'a ShippingAddress,
}

const ORDER_COLUMNS: &str =
    "id, user_id, amount, currency, status, payment_method, shipping_address, created_at";

/// Insert an order and its lines.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if any insert fails.
pub async fn insert(
    conn: &mut PgConnection,
    order: NewOrder<'_>,
    lines: &[PricedLine],
) -> Result<OrderRecord, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        INSERT INTO storefront.order
            (user_id, amount, currency, status, payment_method, shipping_address)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(order.user_id)
    .bind(order.amount)
    .bind(order.currency.code())
    .bind(order.status)
    .bind(order.payment_method)
    .bind(Json(order.shipping_address))
    .fetch_one(&mut *conn)
    .await?;

    for line in lines {
        sqlx::query(
            r"
            INSERT INTO storefront.order_item (order_id, product_id, quantity, price_at_order_time)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(row.id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.price_at_order_time)
        .execute(&mut *conn)
        .await?;
    }

    row.try_into()
}

/// Read an order and lock its row until the transaction ends.
///
/// All payment finalization for an order serializes on this lock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<OrderRecord>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM storefront.order WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.map(TryInto::try_into).transpose()
}

/// Read an order without locking.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<OrderRecord>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM storefront.order WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.map(TryInto::try_into).transpose()
}

/// Lines of an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lines(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Vec<OrderLineView>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderLineRow>(
        r"
        SELECT product_id, quantity, price_at_order_time
        FROM storefront.order_item
        WHERE order_id = $1
        ORDER BY product_id
        ",
    )
    .bind(id)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Move an order to a new status.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order does not exist.
pub async fn set_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
) -> Result<(), RepositoryError> {
    let result =
        sqlx::query("UPDATE storefront.order SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(conn)
            .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// An order with its lines.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn view(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<OrderView>, RepositoryError> {
    let Some(order) = get(&mut *conn, id).await? else {
        return Ok(None);
    };
    let lines = lines(conn, id).await?;
    Ok(Some(order.into_view(lines)))
}
