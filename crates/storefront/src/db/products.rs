//! Product rows: price and the authoritative stock count.

use sqlx::{FromRow, PgConnection};

use pantry_core::cart::ProductSummary;
use pantry_core::{Money, ProductId};

use super::RepositoryError;

#[derive(Debug, FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    price: Money,
    stock: i32,
}

impl From<ProductRow> for ProductSummary {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            price: row.price,
            stock: row.stock,
        }
    }
}

/// Read a product and lock its row until the transaction ends.
///
/// Every stock check followed by a write goes through this lock so two
/// concurrent requests for the same product serialize.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    id: ProductId,
) -> Result<Option<ProductSummary>, RepositoryError> {
    let row = sqlx::query_as::<_, ProductRow>(
        r"
        SELECT id, name, price, stock
        FROM storefront.product
        WHERE id = $1
        FOR UPDATE
        ",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Decrement stock only if enough remains.
///
/// Returns `false` (and changes nothing) when `stock < quantity`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE storefront.product
        SET stock = stock - $2, updated_at = NOW()
        WHERE id = $1 AND stock >= $2
        ",
    )
    .bind(id)
    .bind(quantity)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Current stock of a product, without locking.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn stock(conn: &mut PgConnection, id: ProductId) -> Result<Option<i32>, RepositoryError> {
    let stock = sqlx::query_scalar::<_, i32>("SELECT stock FROM storefront.product WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(stock)
}

/// Insert a product with an explicit id, or overwrite its fields.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails (including a
/// negative price or stock rejected by the table constraints).
pub async fn upsert(
    conn: &mut PgConnection,
    product: &ProductSummary,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO storefront.product (id, name, price, stock)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO UPDATE
        SET name = EXCLUDED.name,
            price = EXCLUDED.price,
            stock = EXCLUDED.stock,
            updated_at = NOW()
        ",
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(product.price)
    .bind(product.stock)
    .execute(&mut *conn)
    .await?;

    // Explicit ids bypass the serial; keep it ahead of them.
    sqlx::query(
        r"
        SELECT setval(
            pg_get_serial_sequence('storefront.product', 'id'),
            GREATEST((SELECT MAX(id) FROM storefront.product), 1)
        )
        ",
    )
    .execute(conn)
    .await?;

    Ok(())
}

/// Overwrite a product's stock.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product does not exist.
pub async fn set_stock(
    conn: &mut PgConnection,
    id: ProductId,
    stock: i32,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE storefront.product SET stock = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(stock)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}
