//! Gateway webhook handling.
//!
//! Deliveries may arrive before, after, or instead of the checkout callback.
//! Capture events finalize through the same idempotent path as `verify`, with
//! the owner taken from the order itself.

use tracing::instrument;

use pantry_core::PaymentStatus;

use super::{Finalization, PaymentError, PaymentService, finalize};
use crate::db;
use crate::gateway::PaymentGateway;
use crate::gateway::webhook::WebhookEvent;

/// What a verified webhook delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The order was finalized by this delivery.
    Finalized,
    /// The order had already been finalized.
    AlreadyFinalized,
    /// The payment moved to `authorized` (or already was further along).
    Authorized,
    /// The payment moved to `failed` (unless it was already `paid`).
    Failed,
    /// Finalization was refused (stock ran out); nothing changed.
    Rejected,
    /// No payment matches the delivery.
    Unmatched,
    /// Unknown event or unreadable body.
    Ignored,
}

impl<G: PaymentGateway> PaymentService<'_, G> {
    /// Handle a webhook delivery.
    ///
    /// Business outcomes are reported through `WebhookOutcome`; only a bad
    /// signature or a database failure is an error.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidWebhookSignature` if the signature is
    /// missing or does not match the body (nothing is processed), and
    /// `PaymentError::Repository` if the database fails.
    #[instrument(skip(self, body, signature), fields(len = body.len()))]
    pub async fn handle_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, PaymentError> {
        if !signature.is_some_and(|sig| self.verifier.verify_webhook(body, sig)) {
            tracing::warn!("Rejected webhook with invalid signature");
            return Err(PaymentError::InvalidWebhookSignature);
        }

        let event = match WebhookEvent::parse(body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable webhook");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        let outcome = match &event {
            WebhookEvent::PaymentAuthorized {
                gateway_order_id,
                gateway_payment_id,
            } => self.authorize(gateway_order_id, gateway_payment_id).await?,
            WebhookEvent::PaymentCaptured {
                gateway_order_id,
                gateway_payment_id,
            } => {
                self.finalize_delivery(gateway_order_id, Some(gateway_payment_id))
                    .await?
            }
            WebhookEvent::OrderPaid {
                gateway_order_id,
                gateway_payment_id,
            } => {
                self.finalize_delivery(gateway_order_id, gateway_payment_id.as_deref())
                    .await?
            }
            WebhookEvent::PaymentFailed {
                gateway_order_id,
                gateway_payment_id,
            } => {
                let mut tx = self.pool.begin().await?;
                let changed = db::payments::mark_failed(
                    &mut tx,
                    gateway_order_id,
                    None,
                    Some(gateway_payment_id),
                )
                .await?;
                tx.commit().await?;
                tracing::info!(%gateway_order_id, changed, "Payment failed");
                WebhookOutcome::Failed
            }
            WebhookEvent::Ignored { .. } => WebhookOutcome::Ignored,
        };

        tracing::info!(event = event.name(), ?outcome, "Processed webhook");
        Ok(outcome)
    }

    async fn authorize(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
    ) -> Result<WebhookOutcome, PaymentError> {
        let mut tx = self.pool.begin().await?;
        let Some(payment) = db::payments::lock_by_gateway_order(&mut tx, gateway_order_id).await?
        else {
            tracing::warn!(%gateway_order_id, "Webhook for unknown gateway order");
            return Ok(WebhookOutcome::Unmatched);
        };

        if payment
            .status
            .can_transition_to(PaymentStatus::Authorized)
        {
            db::payments::compare_and_set_status(
                &mut tx,
                payment.id,
                payment.status,
                PaymentStatus::Authorized,
                Some(gateway_payment_id),
            )
            .await?;
        } else {
            tracing::debug!(status = %payment.status, "Authorization arrived after a later state");
        }
        tx.commit().await?;

        Ok(WebhookOutcome::Authorized)
    }

    async fn finalize_delivery(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: Option<&str>,
    ) -> Result<WebhookOutcome, PaymentError> {
        let mut tx = self.pool.begin().await?;

        // Same lock order as `verify`: order row, then payment row.
        let Some(found) = db::payments::find_by_gateway_order(&mut tx, gateway_order_id).await?
        else {
            tracing::warn!(%gateway_order_id, "Webhook for unknown gateway order");
            return Ok(WebhookOutcome::Unmatched);
        };
        let Some(order) = db::orders::lock(&mut tx, found.order_id).await? else {
            return Ok(WebhookOutcome::Unmatched);
        };
        let Some(payment) = db::payments::lock_by_gateway_order(&mut tx, gateway_order_id).await?
        else {
            return Ok(WebhookOutcome::Unmatched);
        };

        match finalize(&mut tx, &order, &payment, gateway_payment_id).await {
            Ok(finalization) => {
                tx.commit().await?;
                Ok(match finalization {
                    Finalization::Finalized => WebhookOutcome::Finalized,
                    Finalization::AlreadyFinalized => WebhookOutcome::AlreadyFinalized,
                })
            }
            Err(PaymentError::InsufficientStock(shortage)) => {
                tx.rollback().await?;
                tracing::error!(
                    order_id = %order.id,
                    %shortage,
                    "Captured payment could not be finalized"
                );
                Ok(WebhookOutcome::Rejected)
            }
            Err(e) => Err(e),
        }
    }
}
