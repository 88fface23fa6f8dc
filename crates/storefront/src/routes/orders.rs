//! Order route handlers. Orders require a signed-in user.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use pantry_core::OrderId;
use pantry_core::order::{OrderView, PlaceOrderRequest, PlaceOrderResponse};

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::state::AppState;

/// `POST /orders`
#[instrument(skip(state, request), fields(user_id = %user_id, method = %request.payment_method))]
pub async fn place(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<PlaceOrderResponse>)> {
    let order = state.checkout().place_order(user_id, &request).await?;
    let status = order.status;
    Ok((StatusCode::CREATED, Json(PlaceOrderResponse { order, status })))
}

/// `GET /orders/{orderId}`
#[instrument(skip(state), fields(user_id = %user_id, order_id = %order_id))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<OrderView>> {
    Ok(Json(state.checkout().get_order(user_id, order_id).await?))
}
