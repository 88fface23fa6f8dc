//! HMAC-SHA256 signatures on gateway callbacks.
//!
//! - Checkout callback: hex HMAC of `"{gateway_order_id}|{gateway_payment_id}"`
//!   keyed with the API key secret.
//! - Webhook: hex HMAC of the raw request body keyed with the webhook secret.
//!
//! Comparison goes through `Mac::verify_slice`, which is constant time.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Checks signatures on payment callbacks and webhooks.
#[derive(Clone)]
pub struct SignatureVerifier {
    key_secret: SecretString,
    webhook_secret: SecretString,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    #[must_use]
    pub const fn new(key_secret: SecretString, webhook_secret: SecretString) -> Self {
        Self {
            key_secret,
            webhook_secret,
        }
    }

    /// Whether `signature` signs the `(gateway_order_id, gateway_payment_id)` pair.
    #[must_use]
    pub fn verify_payment(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> bool {
        let message = payment_message(gateway_order_id, gateway_payment_id);
        verify(&self.key_secret, message.as_bytes(), signature)
    }

    /// Whether `signature` signs the raw webhook body.
    #[must_use]
    pub fn verify_webhook(&self, body: &[u8], signature: &str) -> bool {
        verify(&self.webhook_secret, body, signature)
    }

    /// Sign a payment pair. The gateway does this on its side; tests and the
    /// fake gateway need it too.
    #[must_use]
    pub fn sign_payment(&self, gateway_order_id: &str, gateway_payment_id: &str) -> String {
        let message = payment_message(gateway_order_id, gateway_payment_id);
        sign(&self.key_secret, message.as_bytes())
    }

    /// Sign a webhook body.
    #[must_use]
    pub fn sign_webhook(&self, body: &[u8]) -> String {
        sign(&self.webhook_secret, body)
    }
}

fn payment_message(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    format!("{gateway_order_id}|{gateway_payment_id}")
}

fn mac(secret: &SecretString) -> Option<HmacSha256> {
    HmacSha256::new_from_slice(secret.expose_secret().as_bytes()).ok()
}

fn sign(secret: &SecretString, message: &[u8]) -> String {
    mac(secret).map_or_else(String::new, |mut mac| {
        mac.update(message);
        hex::encode(mac.finalize().into_bytes())
    })
}

fn verify(secret: &SecretString, message: &[u8], signature: &str) -> bool {
    // Signatures are lowercase hex; anything else cannot match.
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Some(mut mac) = mac(secret) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(&expected).is_ok()
}
