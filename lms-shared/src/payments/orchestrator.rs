//! Payment session orchestration
//!
//! Flow for one payment request:
//!
//! 1. validate the amount and resolve the paid course or lesson
//! 2. record a pending payment (no provider fields)
//! 3. create a provider product named after the target
//! 4. create a price in minor units
//! 5. open a checkout session for the price
//! 6. write product, price, session ID and checkout URL onto the payment
//!
//! Any provider failure aborts the flow. The pending row from step 2 stays
//! behind without session fields; it is reported in the error so an operator
//! can reconcile it. Nothing is rolled back or retried here.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use super::money::{normalize_amount, to_minor_units};
use super::provider::{PaymentProvider, ProviderError};
use super::PaymentTarget;
use crate::models::payment::{CreatePayment, PaymentMethod, ProviderSession};
use crate::store::{PaymentLedger, StoreError};
use crate::validation::FieldError;

/// Default checkout currency
pub const DEFAULT_CURRENCY: &str = "rub";

/// Error type for payment session creation
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// Malformed request (amount, target)
    #[error("Invalid payment request: {0}")]
    Validation(FieldError),

    /// Provider call failed; `payment_id` is the orphaned pending payment
    #[error("Payment provider failed for payment {payment_id}: {source}")]
    Provider {
        payment_id: Uuid,
        #[source]
        source: ProviderError,
    },

    /// Payment row disappeared before the session could be attached
    #[error("Payment {0} disappeared during checkout")]
    PaymentVanished(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<FieldError> for PaymentError {
    fn from(err: FieldError) -> Self {
        PaymentError::Validation(err)
    }
}

/// Validated payment request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub user_id: Uuid,
    pub target: PaymentTarget,
    pub amount: Decimal,
    pub method: PaymentMethod,
}

/// Result returned to the payer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentSession {
    pub payment_id: Uuid,
    pub payment_url: String,
    pub session_id: String,
}

/// Creates checkout sessions through one provider client
///
/// The provider (and its credentials) is injected once at startup.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    provider: Arc<dyn PaymentProvider>,
    currency: String,
}

impl PaymentOrchestrator {
    pub fn new(provider: Arc<dyn PaymentProvider>, currency: impl Into<String>) -> Self {
        Self {
            provider,
            currency: currency.into(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Runs the full flow for one payment request
    ///
    /// # Errors
    ///
    /// - [`PaymentError::Validation`]: bad amount or unknown target; nothing
    ///   was written
    /// - [`PaymentError::Provider`]: a pending payment was written but has no
    ///   session
    pub async fn create_payment_session<L>(
        &self,
        ledger: &L,
        request: PaymentRequest,
    ) -> Result<PaymentSession, PaymentError>
    where
        L: PaymentLedger + ?Sized,
    {
        let amount = normalize_amount(request.amount)?;
        let minor_units = to_minor_units(amount)?;

        let details = ledger.resolve_target(request.target).await?.ok_or_else(|| {
            FieldError::new(request.target.field_name(), "Object with this ID does not exist")
        })?;

        let payment = ledger
            .insert_pending_payment(CreatePayment {
                user_id: request.user_id,
                paid_course_id: request.target.course_id(),
                paid_lesson_id: request.target.lesson_id(),
                amount,
                payment_method: request.method,
            })
            .await?;

        info!(
            payment_id = %payment.id,
            user_id = %request.user_id,
            amount = %amount,
            "Pending payment recorded"
        );

        let provider_failed = |source: ProviderError| {
            error!(
                payment_id = %payment.id,
                error = %source,
                "Payment provider call failed; payment left pending"
            );
            PaymentError::Provider {
                payment_id: payment.id,
                source,
            }
        };

        let product_id = self
            .provider
            .create_product(&details.title, &details.description)
            .await
            .map_err(provider_failed)?;

        let price_id = self
            .provider
            .create_price(&product_id, minor_units, &self.currency)
            .await
            .map_err(provider_failed)?;

        let checkout = self
            .provider
            .create_checkout_session(&price_id)
            .await
            .map_err(provider_failed)?;

        let session = ProviderSession {
            product_id,
            price_id,
            session_id: checkout.session_id,
            url: checkout.url,
        };

        let updated = ledger
            .attach_provider_session(payment.id, &session)
            .await?
            .ok_or(PaymentError::PaymentVanished(payment.id))?;

        info!(
            payment_id = %updated.id,
            session_id = %session.session_id,
            "Checkout session attached to payment"
        );

        Ok(PaymentSession {
            payment_id: updated.id,
            payment_url: session.url,
            session_id: session.session_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::mock::MockPaymentProvider;
    use crate::store::memory::InMemoryStore;
    use rust_decimal_macros::dec;

    fn orchestrator(mock: &MockPaymentProvider) -> PaymentOrchestrator {
        PaymentOrchestrator::new(Arc::new(mock.clone()), DEFAULT_CURRENCY)
    }

    #[tokio::test]
    async fn test_successful_session_is_persisted() {
        let store = InMemoryStore::new();
        let user = store.add_user("payer@example.com").await;
        let course = store.add_course("Rust", None).await;
        let mock = MockPaymentProvider::new();

        let session = orchestrator(&mock)
            .create_payment_session(
                &store,
                PaymentRequest {
                    user_id: user,
                    target: PaymentTarget::Course(course),
                    amount: dec!(19.995),
                    method: PaymentMethod::Transfer,
                },
            )
            .await
            .unwrap();

        assert_eq!(session.session_id, "cs_mock_3");
        assert!(session.payment_url.contains("cs_mock_3"));

        let payment = store.payment(session.payment_id).await.unwrap();
        assert_eq!(payment.amount, dec!(20.00));
        assert_eq!(payment.paid_course_id, Some(course));
        assert_eq!(payment.paid_lesson_id, None);
        assert_eq!(payment.stripe_product_id.as_deref(), Some("prod_mock_1"));
        assert_eq!(payment.stripe_price_id.as_deref(), Some("price_mock_2"));
        assert_eq!(payment.stripe_session_id.as_deref(), Some("cs_mock_3"));

        let price_call = &mock.calls()[1];
        assert_eq!(price_call.args, vec!["prod_mock_1", "2000", "rub"]);
        let product_call = &mock.calls()[0];
        assert_eq!(product_call.args[0], "Rust");
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_orphaned_pending_payment() {
        let store = InMemoryStore::new();
        let user = store.add_user("payer@example.com").await;
        let lesson = store.add_lesson_with_course("Ownership", None).await;
        let mock = MockPaymentProvider::new();
        mock.fail_method("create_price", ProviderError::Network("timeout".into()));

        let result = orchestrator(&mock)
            .create_payment_session(
                &store,
                PaymentRequest {
                    user_id: user,
                    target: PaymentTarget::Lesson(lesson),
                    amount: dec!(100),
                    method: PaymentMethod::Cash,
                },
            )
            .await;

        let Err(PaymentError::Provider { payment_id, .. }) = result else {
            panic!("expected provider error, got {:?}", result);
        };

        let payment = store.payment(payment_id).await.unwrap();
        assert!(!payment.has_session());
        assert!(payment.payment_url.is_none());
        assert_eq!(payment.paid_lesson_id, Some(lesson));
        assert_eq!(mock.call_count("create_checkout_session"), 0);
    }

    #[tokio::test]
    async fn test_unknown_target_writes_nothing() {
        let store = InMemoryStore::new();
        let user = store.add_user("payer@example.com").await;
        let mock = MockPaymentProvider::new();

        let result = orchestrator(&mock)
            .create_payment_session(
                &store,
                PaymentRequest {
                    user_id: user,
                    target: PaymentTarget::Course(Uuid::new_v4()),
                    amount: dec!(10),
                    method: PaymentMethod::Cash,
                },
            )
            .await;

        match result {
            Err(PaymentError::Validation(err)) => assert_eq!(err.field, "paid_course"),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(store.payment_count().await, 0);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_amount_writes_nothing() {
        let store = InMemoryStore::new();
        let user = store.add_user("payer@example.com").await;
        let course = store.add_course("Rust", None).await;
        let mock = MockPaymentProvider::new();

        let result = orchestrator(&mock)
            .create_payment_session(
                &store,
                PaymentRequest {
                    user_id: user,
                    target: PaymentTarget::Course(course),
                    amount: dec!(0),
                    method: PaymentMethod::Cash,
                },
            )
            .await;

        assert!(matches!(result, Err(PaymentError::Validation(_))));
        assert_eq!(store.payment_count().await, 0);
    }
}
