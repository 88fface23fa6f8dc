//! Cart store operations.
//!
//! Every mutation runs in one transaction that first locks the product row,
//! then the owner's line. The stock check and the write therefore see the same
//! stock, and two requests for the same product serialize on the lock.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use pantry_core::cart::{
    self, AddToCartRequest, CartAction, CartItemView, CartView, ProductSummary,
    QuantityError, UpdateCartRequest, UpdateCartResponse,
};
use pantry_core::checkout::{StockShortage, check_stock};
use pantry_core::{Owner, ProductId};

use crate::db::{self, RepositoryError};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Request shape rejected before touching the database.
    #[error("invalid quantity: {0}")]
    Validation(#[from] QuantityError),

    /// The product does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The owner has no line for the product.
    #[error("no cart line for product {0}")]
    LineNotFound(ProductId),

    /// The requested quantity exceeds current stock.
    #[error("out of stock: {0}")]
    OutOfStock(StockShortage),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CartError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Result of an add: a new line, or the untouched existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub action: CartAction,
    pub item: CartItemView,
}

/// Cart store service.
pub struct CartService<'a> {
    pool: &'a PgPool,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The owner's cart with current prices and totals.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn get(&self, owner: &Owner) -> Result<CartView, CartError> {
        let mut conn = self.pool.acquire().await?;
        let items = db::cart::list(&mut conn, owner).await?;
        Ok(CartView::from_items(items))
    }

    /// Sum of quantities in the owner's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn count(&self, owner: &Owner) -> Result<i64, CartError> {
        let mut conn = self.pool.acquire().await?;
        Ok(db::cart::count(&mut conn, owner).await?)
    }

    /// Add a product to the cart.
    ///
    /// An existing line is returned as `Exists` with its quantity unchanged.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` for a quantity below one,
    /// `CartError::ProductNotFound` for an unknown product, and
    /// `CartError::OutOfStock` if the quantity exceeds stock.
    #[instrument(skip(self, request), fields(owner = %owner, product_id = %request.product_id))]
    pub async fn add(
        &self,
        owner: &Owner,
        request: &AddToCartRequest,
    ) -> Result<AddOutcome, CartError> {
        let quantity = cart::add_quantity(request.quantity)?;
        let product_id = request.product_id;

        let mut tx = self.pool.begin().await?;
        let product = lock_product(&mut tx, product_id).await?;

        if let Some(existing) = db::cart::lock_line(&mut tx, owner, product_id).await? {
            tx.commit().await?;
            return Ok(AddOutcome {
                action: CartAction::Exists,
                item: CartItemView::new(existing, product),
            });
        }

        check_stock(product_id, quantity, product.stock).map_err(CartError::OutOfStock)?;
        db::cart::insert(&mut tx, owner, product_id, quantity).await?;
        tx.commit().await?;

        tracing::info!(quantity, "Added cart line");
        Ok(AddOutcome {
            action: CartAction::Created,
            item: CartItemView::new(quantity, product),
        })
    }

    /// Set or adjust the quantity of an existing line.
    ///
    /// A resulting quantity of zero or less deletes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` for a malformed request,
    /// `CartError::LineNotFound` when the owner has no line for the
    /// product, and `CartError::OutOfStock` if the result exceeds stock.
    #[instrument(skip(self, request), fields(owner = %owner, product_id = %product_id))]
    pub async fn update(
        &self,
        owner: &Owner,
        product_id: ProductId,
        request: &UpdateCartRequest,
    ) -> Result<UpdateCartResponse, CartError> {
        let change = request.change()?;

        let mut tx = self.pool.begin().await?;
        let product = lock_product(&mut tx, product_id)
            .await
            .map_err(|e| match e {
                CartError::ProductNotFound(id) => CartError::LineNotFound(id),
                other => other,
            })?;
        let current = db::cart::lock_line(&mut tx, owner, product_id)
            .await?
            .ok_or(CartError::LineNotFound(product_id))?;

        let quantity = change.apply(current);
        if quantity <= 0 {
            db::cart::delete(&mut tx, owner, product_id).await?;
            tx.commit().await?;
            tracing::info!("Deleted cart line");
            return Ok(UpdateCartResponse {
                action: CartAction::Deleted,
                item: None,
            });
        }

        check_stock(product_id, quantity, product.stock).map_err(CartError::OutOfStock)?;
        db::cart::set_quantity(&mut tx, owner, product_id, quantity).await?;
        tx.commit().await?;

        tracing::info!(quantity, "Updated cart line");
        Ok(UpdateCartResponse {
            action: CartAction::Updated,
            item: Some(CartItemView::new(quantity, product)),
        })
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the owner has no line for the product.
    #[instrument(skip(self), fields(owner = %owner, product_id = %product_id))]
    pub async fn remove(&self, owner: &Owner, product_id: ProductId) -> Result<(), CartError> {
        let mut conn = self.pool.acquire().await?;
        if !db::cart::delete(&mut conn, owner, product_id).await? {
            return Err(CartError::LineNotFound(product_id));
        }
        tracing::info!("Removed cart line");
        Ok(())
    }

    /// Remove every line. Returns how many lines were removed.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the delete fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn clear(&self, owner: &Owner) -> Result<u64, CartError> {
        let mut conn = self.pool.acquire().await?;
        let removed = db::cart::clear(&mut conn, owner).await?;
        tracing::info!(removed, "Cleared cart");
        Ok(removed)
    }
}

async fn lock_product(
    conn: &mut sqlx::PgConnection,
    product_id: ProductId,
) -> Result<ProductSummary, CartError> {
    db::products::lock(conn, product_id)
        .await?
        .ok_or(CartError::ProductNotFound(product_id))
}
