//! Webhook payloads sent by the gateway.
//!
//! Deliveries are envelopes of the form
//! `{ "event": "...", "payload": { "payment": { "entity": {...} }, "order": { "entity": {...} } } }`.
//! Only the ids we reconcile on are read.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Payload,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    payment: Option<Wrapped<PaymentEntity>>,
    order: Option<Wrapped<OrderEntity>>,
}

#[derive(Debug, Deserialize)]
struct Wrapped<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderEntity {
    id: String,
}

/// Error when a verified webhook body cannot be interpreted.
#[derive(Debug, thiserror::Error)]
pub enum WebhookParseError {
    #[error("malformed webhook body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{event} webhook is missing {field}")]
    MissingField { event: String, field: &'static str },
}

/// A webhook event the storefront acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// `payment.authorized`: the payment is authorized but not yet captured.
    PaymentAuthorized {
        gateway_order_id: String,
        gateway_payment_id: String,
    },
    /// `payment.captured`: money has moved; finalize the order.
    PaymentCaptured {
        gateway_order_id: String,
        gateway_payment_id: String,
    },
    /// `order.paid`: the gateway order is fully paid; finalize the order.
    OrderPaid {
        gateway_order_id: String,
        gateway_payment_id: Option<String>,
    },
    /// `payment.failed`.
    PaymentFailed {
        gateway_order_id: String,
        gateway_payment_id: String,
    },
    /// Anything else; acknowledged and ignored.
    Ignored { event: String },
}

impl WebhookEvent {
    /// Parse a webhook body.
    ///
    /// # Errors
    ///
    /// Returns `WebhookParseError` if the body is not JSON or a known event
    /// lacks the ids it needs.
    pub fn parse(body: &[u8]) -> Result<Self, WebhookParseError> {
        let envelope: Envelope = serde_json::from_slice(body)?;
        let event = envelope.event;
        let payment = envelope.payload.payment.map(|w| w.entity);
        let order = envelope.payload.order.map(|w| w.entity);

        let missing = |field| WebhookParseError::MissingField {
            event: event.clone(),
            field,
        };

        let payment_ids = |payment: Option<PaymentEntity>| {
            let payment = payment.ok_or_else(|| missing("payment"))?;
            let order_id = payment.order_id.ok_or_else(|| missing("payment.order_id"))?;
            Ok::<_, WebhookParseError>((order_id, payment.id))
        };

        let parsed = match event.as_str() {
            "payment.authorized" => {
                let (gateway_order_id, gateway_payment_id) = payment_ids(payment)?;
                Self::PaymentAuthorized {
                    gateway_order_id,
                    gateway_payment_id,
                }
            }
            "payment.captured" => {
                let (gateway_order_id, gateway_payment_id) = payment_ids(payment)?;
                Self::PaymentCaptured {
                    gateway_order_id,
                    gateway_payment_id,
                }
            }
            "payment.failed" => {
                let (gateway_order_id, gateway_payment_id) = payment_ids(payment)?;
                Self::PaymentFailed {
                    gateway_order_id,
                    gateway_payment_id,
                }
            }
            "order.paid" => {
                let gateway_order_id = order
                    .map(|o| o.id)
                    .or_else(|| payment.as_ref().and_then(|p| p.order_id.clone()))
                    .ok_or_else(|| missing("order"))?;
                Self::OrderPaid {
                    gateway_order_id,
                    gateway_payment_id: payment.map(|p| p.id),
                }
            }
            _ => Self::Ignored {
                event: event.clone(),
            },
        };

        Ok(parsed)
    }

    /// The event name, for logging.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::PaymentAuthorized { .. } => "payment.authorized",
            Self::PaymentCaptured { .. } => "payment.captured",
            Self::OrderPaid { .. } => "order.paid",
            Self::PaymentFailed { .. } => "payment.failed",
            Self::Ignored { event } => event,
        }
    }
}
