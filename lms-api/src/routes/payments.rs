/// Payment endpoints
///
/// - `POST /api/payments/create` - opens a checkout session for a course or lesson
/// - `GET /api/payments` - payment history; moderators see all, others their own
///
/// # Create
///
/// ```text
/// POST /api/payments/create
/// {"paid_course": "...", "amount": "1500.00", "payment_method": "transfer"}
/// ```
///
/// ```json
/// {"id": "...", "payment_url": "https://checkout.stripe.com/...", "stripe_session_id": "cs_..."}
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: both or neither target, unknown target, amount <= 0
/// - `502 Bad Gateway`: the provider failed; a pending payment without a
///   session remains
/// - `503 Service Unavailable`: no provider configured

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::pagination::{Page, PageParams, Pagination},
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        OriginalUri, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use lms_shared::{
    auth::{
        actor::Actor,
        authorization::{payment_scope, require_authenticated},
    },
    models::payment::{Payment, PaymentFilter, PaymentMethod, PaymentOrdering},
    payments::{orchestrator::PaymentRequest, PaymentTarget},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Create body
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub paid_course: Option<Uuid>,
    pub paid_lesson: Option<Uuid>,
    pub amount: Decimal,
    #[serde(default = "default_method")]
    pub payment_method: PaymentMethod,
}

fn default_method() -> PaymentMethod {
    PaymentMethod::Transfer
}

/// Create response
#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub id: Uuid,
    pub payment_url: String,
    pub stripe_session_id: String,
}

/// List query
#[derive(Debug, Default, Deserialize)]
pub struct PaymentQuery {
    pub paid_course: Option<Uuid>,
    pub paid_lesson: Option<Uuid>,
    pub payment_method: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PaymentQuery {
    fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            page_size: self.page_size,
        }
    }

    /// Filter for `owner` (None = every user)
    fn filter(&self, owner: Option<Uuid>) -> ApiResult<PaymentFilter> {
        let payment_method = self
            .payment_method
            .as_deref()
            .map(str::parse::<PaymentMethod>)
            .transpose()
            .map_err(|e| ApiError::field("payment_method", e.to_string()))?;

        let ordering = self
            .ordering
            .as_deref()
            .map(str::parse::<PaymentOrdering>)
            .transpose()
            .map_err(|e| ApiError::field("ordering", e))?
            .unwrap_or_default();

        Ok(PaymentFilter {
            user_id: owner,
            paid_course_id: self.paid_course,
            paid_lesson_id: self.paid_lesson,
            payment_method,
            ordering,
        })
    }
}

/// Open a checkout session
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreatePaymentResponse>)> {
    let user_id = require_authenticated(&actor)?.user_id;
    let Json(req) = body?;

    let target = PaymentTarget::from_fields(req.paid_course, req.paid_lesson)?;

    let orchestrator = state
        .payments
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Payments are not configured".to_string()))?;

    let session = orchestrator
        .create_payment_session(
            &state.store,
            PaymentRequest {
                user_id,
                target,
                amount: req.amount,
                method: req.payment_method,
            },
        )
        .await?;

    info!(payment_id = %session.payment_id, user_id = %user_id, "Checkout session created");

    Ok((
        StatusCode::CREATED,
        Json(CreatePaymentResponse {
            id: session.payment_id,
            payment_url: session.payment_url,
            stripe_session_id: session.session_id,
        }),
    ))
}

/// List payments
///
/// Filters: `paid_course`, `paid_lesson`, `payment_method`;
/// `ordering=payment_date|-payment_date` (default newest first).
pub async fn list_payments(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    OriginalUri(uri): OriginalUri,
    query: Result<Query<PaymentQuery>, QueryRejection>,
) -> ApiResult<Json<Page<Payment>>> {
    let owner = payment_scope(&actor)?.owner_filter();
    let Query(query) = query?;

    let filter = query.filter(owner)?;
    let pagination = Pagination::resolve(query.page_params(), state.config.api.page_size)?;

    let count = Payment::count(&state.db, &filter).await?;
    let results = Payment::list(&state.db, &filter, pagination.limit(), pagination.offset()).await?;

    Ok(Json(Page::new(&uri, pagination, count, results)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_create_request_defaults_to_transfer() {
        let req: CreatePaymentRequest =
            serde_json::from_str(r#"{"paid_course": null, "amount": "19.995"}"#).unwrap();
        assert_eq!(req.payment_method, PaymentMethod::Transfer);
        assert_eq!(req.amount, dec!(19.995));
    }

    #[test]
    fn test_filter_parses_method_and_ordering() {
        let owner = Uuid::new_v4();
        let query = PaymentQuery {
            payment_method: Some("cash".to_string()),
            ordering: Some("payment_date".to_string()),
            ..Default::default()
        };

        let filter = query.filter(Some(owner)).unwrap();
        assert_eq!(filter.user_id, Some(owner));
        assert_eq!(filter.payment_method, Some(PaymentMethod::Cash));
        assert_eq!(filter.ordering, PaymentOrdering::DateAscending);
    }

    #[test]
    fn test_filter_defaults_to_newest_first() {
        let filter = PaymentQuery::default().filter(None).unwrap();
        assert_eq!(filter.ordering, PaymentOrdering::DateDescending);
        assert!(filter.user_id.is_none());
    }

    #[test]
    fn test_filter_rejects_unknown_values() {
        let query = PaymentQuery {
            payment_method: Some("card".to_string()),
            ..Default::default()
        };
        assert!(matches!(query.filter(None), Err(ApiError::ValidationError(_))));

        let query = PaymentQuery {
            ordering: Some("amount".to_string()),
            ..Default::default()
        };
        assert!(matches!(query.filter(None), Err(ApiError::ValidationError(_))));
    }
}
