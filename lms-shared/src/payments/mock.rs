//! In-process payment provider for tests
//!
//! Returns deterministic IDs (`prod_mock_1`, `price_mock_1`, `cs_mock_1`),
//! records every call with its arguments and can be told to fail a given
//! method.
//!
//! ```
//! use lms_shared::payments::mock::MockPaymentProvider;
//! use lms_shared::payments::provider::{PaymentProvider, ProviderError};
//!
//! # async fn example() {
//! let mock = MockPaymentProvider::new();
//! mock.fail_method("create_price", ProviderError::Network("timeout".into()));
//!
//! assert!(mock.create_product("Rust", "").await.is_ok());
//! assert!(mock.create_price("prod_mock_1", 100, "rub").await.is_err());
//! assert_eq!(mock.call_count("create_product"), 1);
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::provider::{CheckoutSession, PaymentProvider, ProviderError};

/// Recorded method call for assertions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

#[derive(Default)]
struct MockState {
    counter: u64,
    method_errors: HashMap<String, ProviderError>,
    call_log: Vec<MethodCall>,
}

/// Mock [`PaymentProvider`]; clones share state
#[derive(Default, Clone)]
pub struct MockPaymentProvider {
    inner: Arc<Mutex<MockState>>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes every future call to `method` fail with `error`
    pub fn fail_method(&self, method: &str, error: ProviderError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        self.state().method_errors.clear();
    }

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state().call_log.iter().filter(|c| c.method == method).count()
    }

    /// Records the call, then either fails or returns the next sequence number
    fn invoke(&self, method: &str, args: Vec<String>) -> Result<u64, ProviderError> {
        let mut state = self.state();
        state.call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });

        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        state.counter += 1;
        Ok(state.counter)
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_product(&self, name: &str, description: &str) -> Result<String, ProviderError> {
        let n = self.invoke("create_product", vec![name.to_string(), description.to_string()])?;
        Ok(format!("prod_mock_{}", n))
    }

    async fn create_price(
        &self,
        product_id: &str,
        minor_units: i64,
        currency: &str,
    ) -> Result<String, ProviderError> {
        let n = self.invoke(
            "create_price",
            vec![product_id.to_string(), minor_units.to_string(), currency.to_string()],
        )?;
        Ok(format!("price_mock_{}", n))
    }

    async fn create_checkout_session(&self, price_id: &str) -> Result<CheckoutSession, ProviderError> {
        let n = self.invoke("create_checkout_session", vec![price_id.to_string()])?;
        Ok(CheckoutSession {
            session_id: format!("cs_mock_{}", n),
            url: format!("https://checkout.stripe.test/c/pay/cs_mock_{}", n),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_with_arguments() {
        let mock = MockPaymentProvider::new();

        mock.create_product("Rust", "Intro").await.unwrap();
        mock.create_price("prod_mock_1", 1999, "rub").await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].args, vec!["prod_mock_1", "1999", "rub"]);
    }

    #[tokio::test]
    async fn test_method_error_only_affects_that_method() {
        let mock = MockPaymentProvider::new();
        mock.fail_method("create_checkout_session", ProviderError::Network("down".into()));

        assert!(mock.create_product("Rust", "").await.is_ok());
        assert!(mock.create_checkout_session("price_1").await.is_err());
        assert_eq!(mock.call_count("create_checkout_session"), 1);

        mock.clear_errors();
        assert!(mock.create_checkout_session("price_1").await.is_ok());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let mock = MockPaymentProvider::new();
        let clone = mock.clone();

        clone.create_product("Rust", "").await.unwrap();
        assert_eq!(mock.call_count("create_product"), 1);
    }
}
