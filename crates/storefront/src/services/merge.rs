//! Guest-to-user cart merge.
//!
//! Runs once per sign-in. The whole merge is one transaction: the guest lines
//! are consumed (deleted) in the same commit that writes the user lines, so a
//! failure leaves both carts untouched and a success cannot be replayed.

use std::collections::HashMap;

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use pantry_core::merge::{MergeInput, MergeStep, MergeWarning, plan_merge};
use pantry_core::{GuestSessionId, Owner, UserId};

use crate::db::{self, RepositoryError};

/// Errors from a merge.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for MergeError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// What a merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Guest lines now present in the user cart.
    pub merged: usize,
    /// Lines whose quantity was capped.
    pub warnings: Vec<MergeWarning>,
}

/// Cart merge service.
pub struct MergeService<'a> {
    pool: &'a PgPool,
}

impl<'a> MergeService<'a> {
    /// Create a new merge service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fold the guest cart into the user cart and delete the guest cart.
    ///
    /// Quantities are summed and clamped to stock; clamps are
    /// reported as warnings rather than failing the merge.
    ///
    /// # Errors
    ///
    /// Returns `MergeError::Repository` if any statement fails; nothing is
    /// committed in that case.
    #[instrument(skip(self), fields(guest = %guest, user = %user))]
    pub async fn merge(
        &self,
        guest: GuestSessionId,
        user: UserId,
    ) -> Result<MergeOutcome, MergeError> {
        let guest = Owner::Guest(guest);
        let user = Owner::User(user);

        let mut tx = self.pool.begin().await?;

        // Lock order matches the cart operations: products (id order), then lines.
        let product_ids = db::cart::product_ids(&mut tx, &guest).await?;
        if product_ids.is_empty() {
            tx.commit().await?;
            return Ok(MergeOutcome::default());
        }
        let mut stock = HashMap::with_capacity(product_ids.len());
        for product_id in product_ids {
            if let Some(product) = db::products::lock(&mut tx, product_id).await? {
                stock.insert(product_id, product.stock);
            }
        }

        let guest_lines = db::cart::lock_lines(&mut tx, &guest).await?;
        for &(product_id, _) in &guest_lines {
            // A line added since the first read.
            if !stock.contains_key(&product_id)
                && let Some(product) = db::products::lock(&mut tx, product_id).await?
            {
                stock.insert(product_id, product.stock);
            }
        }
        let user_lines: HashMap<_, _> = db::cart::lock_lines(&mut tx, &user)
            .await?
            .into_iter()
            .collect();

        let plan = plan_merge(guest_lines.iter().map(|&(product_id, guest_quantity)| {
            MergeInput {
                product_id,
                guest_quantity,
                user_quantity: user_lines.get(&product_id).copied(),
                stock: stock.get(&product_id).copied().unwrap_or(0),
            }
        }));

        for step in &plan.steps {
            match *step {
                MergeStep::Insert {
                    product_id,
                    quantity,
                } => db::cart::insert(&mut tx, &user, product_id, quantity).await?,
                MergeStep::Update {
                    product_id,
                    quantity,
                } => db::cart::set_quantity(&mut tx, &user, product_id, quantity).await?,
                MergeStep::Delete { product_id } => {
                    db::cart::delete(&mut tx, &user, product_id).await?;
                }
                MergeStep::Skip { .. } => {}
            }
        }

        let consumed = db::cart::clear(&mut tx, &guest).await?;
        tx.commit().await?;

        for warning in &plan.warnings {
            tracing::warn!(
                product_id = %warning.product_id,
                requested = warning.requested,
                granted = warning.granted,
                "Merged quantity clamped"
            );
        }
        let merged = plan.merged_count();
        tracing::info!(merged, consumed, "Merged guest cart");

        Ok(MergeOutcome {
            merged,
            warnings: plan.warnings,
        })
    }
}
