/// Error handling for the API server
///
/// Every handler returns `ApiResult<T>`. Library errors convert into
/// [`ApiError`] with `?`, and [`ApiError`] renders as
/// `{"error": code, "message": text, "details"?: [{field, message}]}`.
///
/// | Variant | Status | Code |
/// |---|---|---|
/// | `Unauthorized` | 401 | `unauthorized` |
/// | `Forbidden` | 403 | `forbidden` |
/// | `NotFound` | 404 | `not_found` |
/// | `ValidationError` | 400 | `validation_error` |
/// | `Conflict` | 409 | `conflict` |
/// | `ExternalService` | 502 | `external_service_error` |
/// | `ServiceUnavailable` | 503 | `service_unavailable` |
/// | `InternalError` | 500 | `internal_error` |

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lms_shared::{
    auth::{authorization::AccessError, jwt::JwtError, password::PasswordError},
    notifications::ThrottleError,
    payments::orchestrator::PaymentError,
    store::StoreError,
    subscriptions::SubscriptionError,
    validation::{FieldError, NON_FIELD_ERRORS},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// No authenticated actor (401)
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    Forbidden(String),

    /// Target does not resolve (404)
    NotFound(String),

    /// Malformed input (400)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Duplicate unique value, e.g. email (409)
    Conflict(String),

    /// Payment provider failure (502)
    ExternalService(String),

    /// Feature not configured (503)
    ServiceUnavailable(String),

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "validation_error", "forbidden")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// Single-field validation error
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.into(),
            message: message.into(),
        }])
    }

    /// Generic 404 that never says whether the row exists
    pub fn not_found() -> Self {
        ApiError::NotFound("Not found".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ExternalService(msg) => write!(f, "External service error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_code, message, details) = match self {
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::ExternalService(msg) => ("external_service_error", msg, None),
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg, None),
            ApiError::InternalError(msg) => {
                // Logged, never echoed
                tracing::error!(error = %msg, "Internal error");
                ("internal_error", "An internal error occurred".to_string(), None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::not_found(),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                match db_err.constraint() {
                    Some(constraint) if constraint.contains("email") => {
                        ApiError::Conflict("A user with this email already exists".to_string())
                    }
                    Some(constraint) => {
                        ApiError::Conflict(format!("Constraint violation: {}", constraint))
                    }
                    None => ApiError::Conflict("Duplicate value".to_string()),
                }
            }
            // Deleting a course or lesson that payments still reference
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                ApiError::Conflict("The resource is referenced by existing payments".to_string())
            }
            other => ApiError::InternalError(format!("Database error: {}", other)),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingReference => ApiError::not_found(),
            StoreError::DuplicateJob => {
                ApiError::InternalError("Job with the same dedupe key already queued".to_string())
            }
            StoreError::Database(e) => e.into(),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Unauthorized => {
                ApiError::Unauthorized("Authentication credentials were not provided".to_string())
            }
            AccessError::Forbidden => {
                ApiError::Forbidden("You do not have permission to perform this action".to_string())
            }
        }
    }
}

impl From<FieldError> for ApiError {
    fn from(err: FieldError) -> Self {
        ApiError::field(err.field, err.message)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::field(NON_FIELD_ERRORS, rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::field(NON_FIELD_ERRORS, rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Invalid value".to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(details)
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::CourseNotFound => ApiError::not_found(),
            SubscriptionError::Store(e) => e.into(),
        }
    }
}

impl From<ThrottleError> for ApiError {
    fn from(err: ThrottleError) -> Self {
        match err {
            ThrottleError::CourseNotFound => ApiError::not_found(),
            ThrottleError::NotEnqueued => {
                ApiError::InternalError("Notification job was not enqueued".to_string())
            }
            ThrottleError::Store(e) => e.into(),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation(field) => field.into(),
            PaymentError::Provider { payment_id, source } => ApiError::ExternalService(format!(
                "Payment provider request failed for payment {}: {}",
                payment_id, source
            )),
            PaymentError::PaymentVanished(id) => {
                ApiError::InternalError(format!("Payment {} disappeared during checkout", id))
            }
            PaymentError::Store(e) => e.into(),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooWeak(message) => ApiError::field("password", message),
            other => ApiError::InternalError(format!("Password operation failed: {}", other)),
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => {
                ApiError::InternalError(format!("Token creation failed: {}", msg))
            }
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            other => ApiError::Unauthorized(format!("Invalid token: {}", other)),
        }
    }
}
