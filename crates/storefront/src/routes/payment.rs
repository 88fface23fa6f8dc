//! Payment route handlers.
//!
//! `create-order` and `verify` are called by the checkout page of a signed-in
//! user. The webhook is called by the gateway and authenticates with a
//! signature over the raw body instead of a session.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Serialize;
use tracing::instrument;

use pantry_core::payment::{
    CreateGatewayOrderRequest, CreateGatewayOrderResponse, VerifyPaymentRequest,
    VerifyPaymentResponse,
};

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::services::WebhookOutcome;
use crate::state::AppState;

/// Header carrying the webhook body signature.
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

/// `POST /payment/create-order`
#[instrument(skip(state, request), fields(user_id = %user_id, order_id = %request.order_id))]
pub async fn create_order(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(request): Json<CreateGatewayOrderRequest>,
) -> Result<Json<CreateGatewayOrderResponse>> {
    Ok(Json(
        state
            .payments()
            .create_or_reuse(user_id, request.order_id)
            .await?,
    ))
}

/// `POST /payment/verify`
#[instrument(skip(state, request), fields(user_id = %user_id, order_id = %request.order_id))]
pub async fn verify(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>> {
    Ok(Json(state.payments().verify(user_id, &request).await?))
}

/// Acknowledgement returned for every verified delivery.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: &'static str,
}

const fn outcome_name(outcome: WebhookOutcome) -> &'static str {
    match outcome {
        WebhookOutcome::Finalized => "finalized",
        WebhookOutcome::AlreadyFinalized => "already_finalized",
        WebhookOutcome::Authorized => "authorized",
        WebhookOutcome::Failed => "failed",
        WebhookOutcome::Rejected => "rejected",
        WebhookOutcome::Unmatched => "unmatched",
        WebhookOutcome::Ignored => "ignored",
    }
}

/// `POST /payment/webhook`
///
/// 200 for every verified delivery whatever its business outcome, 400 for a
/// bad signature, 500 when the database fails so the gateway retries.
#[instrument(skip(state, headers, body))]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookAck>)> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state.payments().handle_webhook(&body, signature).await?;
    Ok((
        StatusCode::OK,
        Json(WebhookAck {
            received: true,
            outcome: outcome_name(outcome),
        }),
    ))
}
