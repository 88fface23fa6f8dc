//! Cart API seam and its HTTP implementation.

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use pantry_core::cart::{AddToCartRequest, CartView, MergeCartResponse, UpdateCartRequest};

use crate::machine::Mutation;

/// Errors talking to the cart API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure or timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error: {status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The base URL or a path could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ClientError {
    /// The HTTP status, if the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The operations the cart cache needs from the server.
pub trait CartApi: Send + Sync + 'static {
    /// Read the authoritative cart.
    fn fetch(&self) -> impl Future<Output = Result<CartView, ClientError>> + Send;

    /// Apply one mutation on the server.
    fn apply(&self, mutation: &Mutation) -> impl Future<Output = Result<(), ClientError>> + Send;
}

/// `{ error, code }` body returned by the storefront on failure.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

/// Cart API over HTTP, keeping the session cookie between calls.
#[derive(Debug, Clone)]
pub struct HttpCartApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCartApi {
    /// Create a client for the storefront at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidUrl` for a malformed base URL and
    /// `ClientError::Http` if the HTTP client fails to build.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let (code, message) = serde_json::from_str::<ErrorBody>(&text)
            .map_or_else(|_| ("unknown".to_string(), text), |body| (body.code, body.error));
        Err(ClientError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }

    /// Start (or resume) a guest session so cart calls have an owner.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    pub async fn start_guest_session(&self) -> Result<(), ClientError> {
        let response = self.client.post(self.url("session/guest")?).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Merge the guest cart into the signed-in user's cart.
    ///
    /// Call once after sign-in, then notify the cache with
    /// `ExternalEvent::CartMerged`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request fails; 401 when not signed in.
    pub async fn merge(&self) -> Result<MergeCartResponse, ClientError> {
        let response = self.client.post(self.url("cart/merge")?).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

impl CartApi for HttpCartApi {
    async fn fetch(&self) -> Result<CartView, ClientError> {
        let response = self.client.get(self.url("cart")?).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn apply(&self, mutation: &Mutation) -> Result<(), ClientError> {
        let request = match mutation {
            Mutation::Add { product, quantity } => {
                self.client.post(self.url("cart")?).json(&AddToCartRequest {
                    product_id: product.id,
                    quantity: Some(*quantity),
                })
            }
            Mutation::SetQuantity {
                product_id,
                quantity,
            } => self
                .client
                .patch(self.url(&format!("cart/{product_id}"))?)
                .json(&UpdateCartRequest {
                    quantity: Some(*quantity),
                    delta: None,
                }),
            Mutation::Adjust { product_id, delta } => self
                .client
                .patch(self.url(&format!("cart/{product_id}"))?)
                .json(&UpdateCartRequest {
                    quantity: None,
                    delta: Some(*delta),
                }),
            Mutation::Remove { product_id } => self
                .client
                .delete(self.url(&format!("cart/{product_id}"))?),
            Mutation::Clear => self.client.delete(self.url("cart")?),
        };

        let response = request.send().await?;
        // Removing a line that is already gone leaves the cart as intended
        if matches!(mutation, Mutation::Remove { .. }) && response.status() == StatusCode::NOT_FOUND
        {
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let api = HttpCartApi::new("https://shop.example.com/api", Duration::from_secs(5)).unwrap();
        assert_eq!(
            api.url("cart/7").unwrap().as_str(),
            "https://shop.example.com/api/cart/7"
        );

        let api = HttpCartApi::new("https://shop.example.com", Duration::from_secs(5)).unwrap();
        assert_eq!(
            api.url("cart").unwrap().as_str(),
            "https://shop.example.com/cart"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpCartApi::new("not a url", Duration::from_secs(5)),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_status_accessor() {
        let err = ClientError::Api {
            status: 409,
            code: "out_of_stock".to_string(),
            message: "no".to_string(),
        };
        assert_eq!(err.status(), Some(409));
    }
}
