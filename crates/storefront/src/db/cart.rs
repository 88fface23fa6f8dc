//! Cart line rows keyed by `(owner_kind, owner_key, product_id)`.

use sqlx::{FromRow, PgConnection};

use pantry_core::cart::{CartItemView, ProductSummary};
use pantry_core::checkout::LineSnapshot;
use pantry_core::{Money, Owner, ProductId};

use super::RepositoryError;

/// A cart line joined with its product row.
#[derive(Debug, FromRow)]
struct CartLineRow {
    product_id: ProductId,
    quantity: i32,
    name: String,
    price: Money,
    stock: i32,
}

impl From<CartLineRow> for CartItemView {
    fn from(row: CartLineRow) -> Self {
        Self::new(
            row.quantity,
            ProductSummary {
                id: row.product_id,
                name: row.name,
                price: row.price,
                stock: row.stock,
            },
        )
    }
}

impl From<CartLineRow> for LineSnapshot {
    fn from(row: CartLineRow) -> Self {
        Self {
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.price,
            stock: row.stock,
        }
    }
}

/// All lines of an owner's cart, enriched with current price and stock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list(
    conn: &mut PgConnection,
    owner: &Owner,
) -> Result<Vec<CartItemView>, RepositoryError> {
    let rows = sqlx::query_as::<_, CartLineRow>(
        r"
        SELECT c.product_id, c.quantity, p.name, p.price, p.stock
        FROM storefront.cart_item c
        JOIN storefront.product p ON p.id = c.product_id
        WHERE c.owner_kind = $1 AND c.owner_key = $2
        ORDER BY c.created_at, c.id
        ",
    )
    .bind(owner.kind())
    .bind(owner.key())
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Snapshot of the owner's cart for checkout, locking every product row.
///
/// Rows are locked in product id order so concurrent checkouts sharing
/// products cannot deadlock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_for_checkout(
    conn: &mut PgConnection,
    owner: &Owner,
) -> Result<Vec<LineSnapshot>, RepositoryError> {
    let rows = sqlx::query_as::<_, CartLineRow>(
        r"
        SELECT c.product_id, c.quantity, p.name, p.price, p.stock
        FROM storefront.cart_item c
        JOIN storefront.product p ON p.id = c.product_id
        WHERE c.owner_kind = $1 AND c.owner_key = $2
        ORDER BY c.product_id
        FOR UPDATE OF p
        ",
    )
    .bind(owner.kind())
    .bind(owner.key())
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Quantity of the owner's line for a product, locking the line.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_line(
    conn: &mut PgConnection,
    owner: &Owner,
    product_id: ProductId,
) -> Result<Option<i32>, RepositoryError> {
    let quantity = sqlx::query_scalar::<_, i32>(
        r"
        SELECT quantity
        FROM storefront.cart_item
        WHERE owner_kind = $1 AND owner_key = $2 AND product_id = $3
        FOR UPDATE
        ",
    )
    .bind(owner.kind())
    .bind(owner.key())
    .bind(product_id)
    .fetch_optional(conn)
    .await?;

    Ok(quantity)
}

/// Product ids in an owner's cart, in id order, without locking.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn product_ids(
    conn: &mut PgConnection,
    owner: &Owner,
) -> Result<Vec<ProductId>, RepositoryError> {
    let ids = sqlx::query_scalar::<_, ProductId>(
        r"
        SELECT product_id
        FROM storefront.cart_item
        WHERE owner_kind = $1 AND owner_key = $2
        ORDER BY product_id
        ",
    )
    .bind(owner.kind())
    .bind(owner.key())
    .fetch_all(conn)
    .await?;

    Ok(ids)
}

/// All `(product_id, quantity)` lines of an owner, locking them.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_lines(
    conn: &mut PgConnection,
    owner: &Owner,
) -> Result<Vec<(ProductId, i32)>, RepositoryError> {
    let lines = sqlx::query_as::<_, (ProductId, i32)>(
        r"
        SELECT product_id, quantity
        FROM storefront.cart_item
        WHERE owner_kind = $1 AND owner_key = $2
        ORDER BY product_id
        FOR UPDATE
        ",
    )
    .bind(owner.kind())
    .bind(owner.key())
    .fetch_all(conn)
    .await?;

    Ok(lines)
}

/// Create a line.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the owner already has a line for the product.
pub async fn insert(
    conn: &mut PgConnection,
    owner: &Owner,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO storefront.cart_item (owner_kind, owner_key, product_id, quantity)
        VALUES ($1, $2, $3, $4)
        ",
    )
    .bind(owner.kind())
    .bind(owner.key())
    .bind(product_id)
    .bind(quantity)
    .execute(conn)
    .await
    .map_err(|e| RepositoryError::from_unique(e, "cart line"))?;

    Ok(())
}

/// Overwrite a line's quantity.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the line does not exist.
pub async fn set_quantity(
    conn: &mut PgConnection,
    owner: &Owner,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE storefront.cart_item
        SET quantity = $4, updated_at = NOW()
        WHERE owner_kind = $1 AND owner_key = $2 AND product_id = $3
        ",
    )
    .bind(owner.kind())
    .bind(owner.key())
    .bind(product_id)
    .bind(quantity)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Delete a line. Returns whether a line existed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn delete(
    conn: &mut PgConnection,
    owner: &Owner,
    product_id: ProductId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        DELETE FROM storefront.cart_item
        WHERE owner_kind = $1 AND owner_key = $2 AND product_id = $3
        ",
    )
    .bind(owner.kind())
    .bind(owner.key())
    .bind(product_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete every line of an owner. Returns the number of lines removed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn clear(conn: &mut PgConnection, owner: &Owner) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        "DELETE FROM storefront.cart_item WHERE owner_kind = $1 AND owner_key = $2",
    )
    .bind(owner.kind())
    .bind(owner.key())
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Sum of quantities across an owner's lines.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn count(conn: &mut PgConnection, owner: &Owner) -> Result<i64, RepositoryError> {
    let count = sqlx::query_scalar::<_, i64>(
        r"
        SELECT COALESCE(SUM(quantity), 0)::BIGINT
        FROM storefront.cart_item
        WHERE owner_kind = $1 AND owner_key = $2
        ",
    )
    .bind(owner.kind())
    .bind(owner.key())
    .fetch_one(conn)
    .await?;

    Ok(count)
}
