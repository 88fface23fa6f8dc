//! Payment reconciliation.
//!
//! `None → Created → Paid | Failed`. Three entry points drive it:
//!
//! - [`PaymentService::create_or_reuse`] hands out a gateway order for an
//!   online order, reusing an open one when it exists.
//! - [`PaymentService::verify`] handles the signed checkout callback.
//! - [`PaymentService::handle_webhook`] handles gateway-initiated deliveries.
//!
//! Both completion paths converge on [`finalize`], which runs under the order
//! row lock and performs stock decrement, cart clear and the `paid` transition
//! at most once per order.

mod error;
mod webhook;

pub use error::PaymentError;
pub use webhook::WebhookOutcome;

use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use pantry_core::checkout::StockShortage;
use pantry_core::payment::{
    CreateGatewayOrderResponse, VerifyPaymentRequest, VerifyPaymentResponse,
};
use pantry_core::{OrderId, OrderStatus, Owner, PaymentMethod, UserId};

use crate::db;
use crate::db::orders::OrderRecord;
use crate::db::payments::PaymentRecord;
use crate::gateway::{GatewayOrderRequest, PaymentGateway, SignatureVerifier};

/// Whether a completion did the work or found it already done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalization {
    /// Stock decremented, cart cleared, payment marked `paid` by this call.
    Finalized,
    /// An earlier call had already finalized the order; nothing changed.
    AlreadyFinalized,
}

/// Payment reconciliation service.
pub struct PaymentService<'a, G> {
    pool: &'a PgPool,
    gateway: &'a G,
    verifier: &'a SignatureVerifier,
    key_id: &'a str,
}

impl<'a, G: PaymentGateway> PaymentService<'a, G> {
    /// Create a new payment service.
    ///
    /// `key_id` is the public gateway key returned to the checkout widget.
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        gateway: &'a G,
        verifier: &'a SignatureVerifier,
        key_id: &'a str,
    ) -> Self {
        Self {
            pool,
            gateway,
            verifier,
            key_id,
        }
    }

    /// Return a gateway order for an online order, creating one only when no
    /// reusable payment exists.
    ///
    /// The gateway call happens outside any transaction. Its result is stored
    /// in a second transaction that re-checks for a reusable payment under the
    /// order lock, so concurrent callers end up sharing one gateway order.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::OrderNotFound`, `PaymentError::Forbidden`,
    /// `PaymentError::NotOnlineOrder`, or `PaymentError::Gateway` when the
    /// gateway fails or times out.
    #[instrument(skip(self), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn create_or_reuse(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<CreateGatewayOrderResponse, PaymentError> {
        let mut tx = self.pool.begin().await?;
        let order = lock_owned_order(&mut tx, user_id, order_id).await?;
        if order.payment_method != PaymentMethod::Online {
            return Err(PaymentError::NotOnlineOrder(order_id));
        }
        if let Some(existing) = db::payments::find_reusable(&mut tx, order_id).await? {
            tx.commit().await?;
            return Ok(self.reused(&order, &existing));
        }
        tx.commit().await?;

        let created = self
            .gateway
            .create_order(GatewayOrderRequest {
                amount: order.amount,
                currency: order.currency,
                receipt: order.id,
            })
            .await?;

        let mut tx = self.pool.begin().await?;
        let order = lock_owned_order(&mut tx, user_id, order_id).await?;
        if let Some(existing) = db::payments::find_reusable(&mut tx, order_id).await? {
            tx.commit().await?;
            tracing::info!(
                orphaned_gateway_order_id = %created.id,
                gateway_order_id = existing.gateway_order_id.as_deref().unwrap_or_default(),
                "Concurrent request created the gateway order first"
            );
            return Ok(self.reused(&order, &existing));
        }

        let payment =
            db::payments::insert_online(&mut tx, order.id, order.amount, &created.id).await?;
        tx.commit().await?;

        tracing::info!(
            gateway_order_id = %created.id,
            payment_id = %payment.id,
            "Created gateway order"
        );
        Ok(CreateGatewayOrderResponse {
            gateway_order_id: created.id,
            amount: order.amount,
            currency: order.currency,
            key_id: self.key_id.to_owned(),
            reused: false,
        })
    }

    fn reused(&self, order: &OrderRecord, payment: &PaymentRecord) -> CreateGatewayOrderResponse {
        tracing::info!(
            gateway_order_id = payment.gateway_order_id.as_deref().unwrap_or_default(),
            status = %payment.status,
            "Reusing gateway order"
        );
        CreateGatewayOrderResponse {
            gateway_order_id: payment.gateway_order_id.clone().unwrap_or_default(),
            amount: order.amount,
            currency: order.currency,
            key_id: self.key_id.to_owned(),
            reused: true,
        }
    }

    /// Verify a checkout callback and finalize the order.
    ///
    /// Repeating a successful call is a no-op success
    /// (`already_finalized: true`).
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` after marking the payment
    /// `failed`. Returns `PaymentError::PaymentRecordNotFound`,
    /// `PaymentError::OrderNotFound`, `PaymentError::Forbidden` or
    /// `PaymentError::InsufficientStock` without changing anything.
    #[instrument(
        skip(self, request),
        fields(
            user_id = %user_id,
            order_id = %request.order_id,
            gateway_order_id = %request.gateway_order_id,
        )
    )]
    pub async fn verify(
        &self,
        user_id: UserId,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, PaymentError> {
        if !self.verifier.verify_payment(
            &request.gateway_order_id,
            &request.gateway_payment_id,
            &request.signature,
        ) {
            self.record_invalid_signature(user_id, request).await?;
            return Err(PaymentError::InvalidSignature);
        }

        let mut tx = self.pool.begin().await?;
        let order = db::orders::lock(&mut tx, request.order_id).await?;
        let payment = db::payments::lock_by_gateway_order(&mut tx, &request.gateway_order_id)
            .await?
            .ok_or_else(|| PaymentError::PaymentRecordNotFound(request.gateway_order_id.clone()))?;
        let order = order.ok_or(PaymentError::OrderNotFound(request.order_id))?;
        if order.user_id != user_id {
            return Err(PaymentError::Forbidden(order.id));
        }
        if payment.order_id != order.id {
            return Err(PaymentError::PaymentRecordNotFound(
                request.gateway_order_id.clone(),
            ));
        }

        let outcome =
            finalize(&mut tx, &order, &payment, Some(&request.gateway_payment_id)).await?;
        let view = db::orders::view(&mut tx, order.id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order.id))?;
        tx.commit().await?;

        Ok(VerifyPaymentResponse {
            success: true,
            order: view,
            already_finalized: outcome == Finalization::AlreadyFinalized,
        })
    }

    async fn record_invalid_signature(
        &self,
        user_id: UserId,
        request: &VerifyPaymentRequest,
    ) -> Result<(), PaymentError> {
        let mut tx = self.pool.begin().await?;
        let owned = db::orders::get(&mut tx, request.order_id)
            .await?
            .is_some_and(|order| order.user_id == user_id);
        let marked = owned
            && db::payments::mark_failed(
                &mut tx,
                &request.gateway_order_id,
                Some(request.order_id),
                Some(&request.gateway_payment_id),
            )
            .await?;
        tx.commit().await?;

        tracing::warn!(marked_failed = marked, "Payment signature mismatch");
        Ok(())
    }
}

/// Lock an order and check that `user_id` owns it.
async fn lock_owned_order(
    conn: &mut PgConnection,
    user_id: UserId,
    order_id: OrderId,
) -> Result<OrderRecord, PaymentError> {
    let order = db::orders::lock(conn, order_id)
        .await?
        .ok_or(PaymentError::OrderNotFound(order_id))?;
    if order.user_id != user_id {
        return Err(PaymentError::Forbidden(order_id));
    }
    Ok(order)
}

/// Finalize a paid order exactly once.
///
/// The caller holds the order row lock (`db::orders::lock`) and the payment row
/// lock, and commits on `Ok`. On `Err` the caller must roll back.
///
/// # Errors
///
/// Returns `PaymentError::InsufficientStock` if any line no longer fits in
/// stock; the `paid` mark made earlier in the transaction is rolled back with it.
pub(crate) async fn finalize(
    conn: &mut PgConnection,
    order: &OrderRecord,
    payment: &PaymentRecord,
    gateway_payment_id: Option<&str>,
) -> Result<Finalization, PaymentError> {
    if db::payments::count_paid(conn, order.id).await? > 0 {
        if let Some(id) = gateway_payment_id {
            db::payments::fill_gateway_payment_id(conn, payment.id, id).await?;
        }
        tracing::info!(order_id = %order.id, "Order already finalized");
        return Ok(Finalization::AlreadyFinalized);
    }

    if !db::payments::mark_paid(conn, payment.id, gateway_payment_id).await? {
        tracing::info!(order_id = %order.id, "Payment already paid");
        return Ok(Finalization::AlreadyFinalized);
    }

    for line in db::orders::lines(conn, order.id).await? {
        if !db::products::decrement_stock(conn, line.product_id, line.quantity).await? {
            let available = db::products::stock(conn, line.product_id)
                .await?
                .unwrap_or(0);
            tracing::warn!(
                order_id = %order.id,
                product_id = %line.product_id,
                requested = line.quantity,
                available,
                "Stock ran out before payment finalized"
            );
            return Err(PaymentError::InsufficientStock(StockShortage {
                product_id: line.product_id,
                requested: line.quantity,
                available,
            }));
        }
    }

    db::orders::set_status(conn, order.id, OrderStatus::Paid).await?;
    let cleared = db::cart::clear(conn, &Owner::User(order.user_id)).await?;

    tracing::info!(
        order_id = %order.id,
        payment_id = %payment.id,
        cleared,
        "Finalized paid order"
    );
    Ok(Finalization::Finalized)
}
