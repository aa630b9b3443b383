//! Stripe payment provider
//!
//! Talks to the Stripe REST API with form-encoded requests and HTTP basic
//! auth (secret key as username, empty password). One client is built at
//! startup from [`StripeConfig`] and shared; the secret key never leaves
//! the config.
//!
//! # Configuration
//!
//! ```no_run
//! use lms_shared::payments::stripe::{StripeClient, StripeConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StripeConfig::new("sk_test_...")
//!     .with_redirect_urls("https://lms.example.com/paid", "https://lms.example.com/cancelled");
//! let client = StripeClient::new(config)?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::provider::{CheckoutSession, PaymentProvider, ProviderError};

/// Default Stripe API base URL
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Stripe client configuration
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_live_... or sk_test_...)
    api_key: SecretString,

    /// Base URL for the API (overridable for tests and proxies)
    api_base_url: String,

    /// Where Stripe sends the user after paying
    success_url: String,

    /// Where Stripe sends the user after abandoning checkout
    cancel_url: String,

    /// Per-request timeout
    timeout: Duration,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_base_url", &self.api_base_url)
            .field("success_url", &self.success_url)
            .field("cancel_url", &self.cancel_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: DEFAULT_API_BASE.to_string(),
            success_url: "http://127.0.0.1:8000/api/payments/success/".to_string(),
            cancel_url: "http://127.0.0.1:8000/api/payments/cancel/".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set a custom API base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set checkout success and cancel URLs
    pub fn with_redirect_urls(mut self, success_url: impl Into<String>, cancel_url: impl Into<String>) -> Self {
        self.success_url = success_url.into();
        self.cancel_url = cancel_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Stripe implementation of [`PaymentProvider`]
pub struct StripeClient {
    config: StripeConfig,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct StripeObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeCheckoutSession {
    id: String,
    url: Option<String>,
}

impl StripeClient {
    /// Builds the client and its connection pool
    pub fn new(config: StripeConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self { config, http_client })
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                warn!(path = path, error = %e, "Stripe request failed");
                ProviderError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(path = path, status = status.as_u16(), "Stripe rejected request");
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

fn product_params(name: &str, description: &str) -> Vec<(&'static str, String)> {
    let mut params = vec![("name", name.to_string())];
    // Stripe rejects an empty description
    if !description.is_empty() {
        params.push(("description", description.to_string()));
    }
    params
}

fn price_params(product_id: &str, minor_units: i64, currency: &str) -> Vec<(&'static str, String)> {
    vec![
        ("product", product_id.to_string()),
        ("unit_amount", minor_units.to_string()),
        ("currency", currency.to_ascii_lowercase()),
    ]
}

fn checkout_params(price_id: &str, success_url: &str, cancel_url: &str) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "payment".to_string()),
        ("line_items[0][price]", price_id.to_string()),
        ("line_items[0][quantity]", "1".to_string()),
        ("success_url", success_url.to_string()),
        ("cancel_url", cancel_url.to_string()),
    ]
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_product(&self, name: &str, description: &str) -> Result<String, ProviderError> {
        let product: StripeObject = self
            .post_form("/v1/products", &product_params(name, description))
            .await?;
        debug!(product_id = %product.id, "Stripe product created");
        Ok(product.id)
    }

    async fn create_price(
        &self,
        product_id: &str,
        minor_units: i64,
        currency: &str,
    ) -> Result<String, ProviderError> {
        let price: StripeObject = self
            .post_form("/v1/prices", &price_params(product_id, minor_units, currency))
            .await?;
        debug!(price_id = %price.id, minor_units = minor_units, "Stripe price created");
        Ok(price.id)
    }

    async fn create_checkout_session(&self, price_id: &str) -> Result<CheckoutSession, ProviderError> {
        let params = checkout_params(price_id, &self.config.success_url, &self.config.cancel_url);
        let session: StripeCheckoutSession = self.post_form("/v1/checkout/sessions", &params).await?;

        let url = session.url.ok_or_else(|| {
            ProviderError::InvalidResponse(format!("Checkout session {} has no URL", session.id))
        })?;

        debug!(session_id = %session.id, "Stripe checkout session created");
        Ok(CheckoutSession {
            session_id: session.id,
            url,
        })
    }
}
