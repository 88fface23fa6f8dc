//! Guest-to-user cart merge planning.
//!
//! At sign-in the guest cart is folded into the user cart. For each guest
//! line the merged quantity is `min(user + guest, stock)`; anything lost to
//! the stock clamp is reported as a warning instead of failing the
//! merge. The storefront executes the resulting plan and then deletes every
//! guest line in the same transaction.

use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// One guest line together with what the user cart and catalog currently hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeInput {
    pub product_id: ProductId,
    pub guest_quantity: i32,
    /// Quantity of the user's existing line for the product, if any.
    pub user_quantity: Option<i32>,
    /// Current product stock.
    pub stock: i32,
}

/// A write the merge transaction performs on the user cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStep {
    /// Create a user line.
    Insert { product_id: ProductId, quantity: i32 },
    /// Overwrite the user line's quantity.
    Update { product_id: ProductId, quantity: i32 },
    /// The merged quantity is zero; drop the user line.
    Delete { product_id: ProductId },
    /// Nothing to write (no user line and nothing grantable).
    Skip { product_id: ProductId },
}

impl MergeStep {
    /// Whether this step leaves a line in the user cart.
    #[must_use]
    pub const fn merges_line(&self) -> bool {
        matches!(self, Self::Insert { .. } | Self::Update { .. })
    }
}

/// A merged quantity that was capped below what the two carts asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeWarning {
    pub product_id: ProductId,
    /// `user + guest` quantity.
    pub requested: i32,
    /// Quantity actually kept.
    pub granted: i32,
}

/// Writes to perform plus advisory warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    pub steps: Vec<MergeStep>,
    pub warnings: Vec<MergeWarning>,
}

impl MergePlan {
    /// Number of guest lines that ended up in the user cart.
    #[must_use]
    pub fn merged_count(&self) -> usize {
        self.steps.iter().filter(|step| step.merges_line()).count()
    }
}

/// Plan a merge.
#[must_use]
pub fn plan_merge(inputs: impl IntoIterator<Item = MergeInput>) -> MergePlan {
    let mut plan = MergePlan::default();

    for input in inputs {
        let requested = input
            .user_quantity
            .unwrap_or(0)
            .saturating_add(input.guest_quantity);
        let granted = requested.min(input.stock.max(0));
        let product_id = input.product_id;

        if granted < requested {
            plan.warnings.push(MergeWarning {
                product_id,
                requested,
                granted,
            });
        }

        let step = match (input.user_quantity, granted) {
            (Some(_), 0) => MergeStep::Delete { product_id },
            (Some(_), quantity) => MergeStep::Update {
                product_id,
                quantity,
            },
            (None, 0) => MergeStep::Skip { product_id },
            (None, quantity) => MergeStep::Insert {
                product_id,
                quantity,
            },
        };
        plan.steps.push(step);
    }

    plan
}
