/// Payment provider port
///
/// The orchestrator talks to the provider through three calls, in this
/// order: create a product, create a price for it, open a checkout session
/// for the price. Implementations:
///
/// - [`super::stripe::StripeClient`]: Stripe REST API
/// - [`super::mock::MockPaymentProvider`]: tests

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error type for provider calls
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Request never produced a response (DNS, TLS, timeout, ...)
    #[error("Payment provider unreachable: {0}")]
    Network(String),

    /// Provider answered with a non-success status
    #[error("Payment provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Provider answered with a body we could not understand
    #[error("Unexpected payment provider response: {0}")]
    InvalidResponse(String),
}

/// Checkout session opened for a price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

/// External payment provider
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a product and returns its ID
    async fn create_product(&self, name: &str, description: &str) -> Result<String, ProviderError>;

    /// Creates a one-off price in minor currency units and returns its ID
    async fn create_price(
        &self,
        product_id: &str,
        minor_units: i64,
        currency: &str,
    ) -> Result<String, ProviderError>;

    /// Opens a checkout session for a single unit of `price_id`
    async fn create_checkout_session(&self, price_id: &str) -> Result<CheckoutSession, ProviderError>;
}
