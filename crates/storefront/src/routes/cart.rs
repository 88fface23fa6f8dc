//! Cart route handlers.
//!
//! The cart belongs to whichever owner the session resolves to: the signed-in
//! user, otherwise the guest session. Responses are JSON and consumed by the
//! client cart cache.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tower_sessions::Session;
use tracing::instrument;

use pantry_core::cart::{
    AddToCartRequest, AddToCartResponse, CartAction, CartCountResponse, CartView,
    ClearCartResponse, MergeCartResponse, RemoveFromCartResponse, UpdateCartRequest,
    UpdateCartResponse,
};
use pantry_core::{GuestSessionId, ProductId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{Identity, RequireOwner};
use crate::models::session_keys;
use crate::state::AppState;

/// `GET /cart`
#[instrument(skip(state), fields(owner = %owner))]
pub async fn show(
    State(state): State<AppState>,
    RequireOwner(owner): RequireOwner,
) -> Result<Json<CartView>> {
    Ok(Json(state.cart().get(&owner).await?))
}

/// `POST /cart`
///
/// 201 when a line was created, 200 when it already existed.
#[instrument(skip(state, request), fields(owner = %owner, product_id = %request.product_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireOwner(owner): RequireOwner,
    Json(request): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<AddToCartResponse>)> {
    let outcome = state.cart().add(&owner, &request).await?;
    let status = if outcome.action == CartAction::Created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(AddToCartResponse {
            action: outcome.action,
            item: outcome.item,
        }),
    ))
}

/// `PATCH /cart/{productId}`
#[instrument(skip(state, request), fields(owner = %owner, product_id = %product_id))]
pub async fn update(
    State(state): State<AppState>,
    RequireOwner(owner): RequireOwner,
    Path(product_id): Path<ProductId>,
    Json(request): Json<UpdateCartRequest>,
) -> Result<Json<UpdateCartResponse>> {
    Ok(Json(
        state.cart().update(&owner, product_id, &request).await?,
    ))
}

/// `DELETE /cart/{productId}`
#[instrument(skip(state), fields(owner = %owner, product_id = %product_id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireOwner(owner): RequireOwner,
    Path(product_id): Path<ProductId>,
) -> Result<Json<RemoveFromCartResponse>> {
    state.cart().remove(&owner, product_id).await?;
    Ok(Json(RemoveFromCartResponse {
        action: CartAction::Deleted,
        product_id,
    }))
}

/// `DELETE /cart`
#[instrument(skip(state), fields(owner = %owner))]
pub async fn clear(
    State(state): State<AppState>,
    RequireOwner(owner): RequireOwner,
) -> Result<Json<ClearCartResponse>> {
    let removed = state.cart().clear(&owner).await?;
    Ok(Json(ClearCartResponse {
        action: CartAction::Cleared,
        removed,
    }))
}

/// `GET /cart/count`
#[instrument(skip(state), fields(owner = %owner))]
pub async fn count(
    State(state): State<AppState>,
    RequireOwner(owner): RequireOwner,
) -> Result<Json<CartCountResponse>> {
    let count = state.cart().count(&owner).await?;
    Ok(Json(CartCountResponse { count }))
}

/// `POST /cart/merge`
///
/// Folds the guest cart into the signed-in user's cart, then forgets the guest
/// id so the next call is a no-op.
#[instrument(skip(state, identity, session), fields(user = ?identity.user))]
pub async fn merge(
    State(state): State<AppState>,
    identity: Identity,
    session: Session,
) -> Result<Json<MergeCartResponse>> {
    let user = identity
        .user
        .ok_or_else(|| AppError::Unauthorized("sign in required".to_string()))?;

    let Some(guest) = identity.guest else {
        tracing::debug!("No guest cart to merge");
        return Ok(Json(MergeCartResponse {
            action: CartAction::Merged,
            items_count: 0,
            warnings: Vec::new(),
        }));
    };

    let outcome = state.merge().merge(guest, user).await?;
    session
        .remove::<GuestSessionId>(session_keys::GUEST_SESSION_ID)
        .await?;

    add_breadcrumb(
        "cart",
        "Merged guest cart",
        Some(&[("items", &outcome.merged.to_string())]),
    );

    Ok(Json(MergeCartResponse {
        action: CartAction::Merged,
        items_count: outcome.merged,
        warnings: outcome.warnings,
    }))
}
