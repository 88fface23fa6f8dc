//! Product management commands.

use pantry_core::ProductId;
use pantry_storefront::db;

use super::{CliError, connect};

/// Set a product's available stock.
pub async fn set_stock(id: ProductId, stock: i32) -> Result<(), CliError> {
    if stock < 0 {
        return Err(CliError::Invalid(format!("stock must be >= 0 (got {stock})")));
    }

    let pool = connect().await?;
    let mut conn = pool.acquire().await?;
    db::products::set_stock(&mut conn, id, stock).await?;

    tracing::info!(product_id = %id, stock, "Stock updated");
    Ok(())
}
