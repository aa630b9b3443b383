//! Router tests that never reach the database
//!
//! Every request here is rejected (or answered) by the middleware, the
//! access policy or input validation before a query runs.

mod common;

use axum::http::{header, Method, StatusCode};
use common::{get_request, json_request, offline_app, send};
use lms_shared::auth::jwt::TokenType;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_anonymous_list_is_unauthorized() {
    let (app, _) = offline_app(None);

    for uri in ["/api/courses", "/api/lessons", "/api/payments", "/api/users"] {
        let (status, body) = send(&app, get_request(uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["error"], "unauthorized");
    }
}

#[tokio::test]
async fn test_authentication_checked_before_body() {
    let (app, _) = offline_app(None);

    let request = json_request(Method::POST, "/api/courses", None, json!({"nonsense": true}));
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_token_treated_as_anonymous() {
    let (app, _) = offline_app(None);

    let (status, _) = send(&app, get_request("/api/lessons", Some("not.a.jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let item = format!("/api/courses/{}", Uuid::new_v4());
    let (status, _) = send(&app, get_request(&item, Some("not.a.jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_anonymous_subscription_and_payment_rejected() {
    let (app, _) = offline_app(None);

    let request = json_request(
        Method::POST,
        "/api/course-subscriptions",
        None,
        json!({"course_id": Uuid::new_v4()}),
    );
    assert_eq!(send(&app, request).await.0, StatusCode::UNAUTHORIZED);

    let request = json_request(
        Method::POST,
        "/api/payments/create",
        None,
        json!({"paid_course": Uuid::new_v4(), "amount": "10.00"}),
    );
    assert_eq!(send(&app, request).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_validation_errors() {
    let (app, _) = offline_app(None);

    let request = json_request(
        Method::POST,
        "/api/users/register",
        None,
        json!({"email": "not-an-email", "password": "long enough password"}),
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "email");

    let request = json_request(
        Method::POST,
        "/api/users/register",
        None,
        json!({"email": "student@example.com", "password": "1234567890"}),
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "password");
}

#[tokio::test]
async fn test_malformed_json_is_validation_error() {
    let (app, _) = offline_app(None);

    let request = json_request(Method::POST, "/api/users/register", None, json!({"email": 5}));
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "non_field_errors");
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let (app, state) = offline_app(None);
    let access = state.tokens.issue(Uuid::new_v4(), TokenType::Access).unwrap();

    let request = json_request(Method::POST, "/api/token/refresh", None, json!({"refresh": access}));
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let request = json_request(Method::POST, "/api/token/refresh", None, json!({"refresh": "garbage"}));
    assert_eq!(send(&app, request).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_reports_disconnected_database() {
    let (app, _) = offline_app(None);

    let (status, body) = send(&app, get_request("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "disconnected");
    assert!(body.get("migrations").is_none());
}

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let (app, _) = offline_app(None);

    let response = tower::ServiceExt::oneshot(app, get_request("/api/courses", None))
        .await
        .unwrap();
    assert_eq!(response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _) = offline_app(None);
    let (status, _) = send(&app, get_request("/api/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
