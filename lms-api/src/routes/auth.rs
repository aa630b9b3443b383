/// Token endpoints
///
/// - `POST /api/token` - exchange email and password for an access/refresh pair
/// - `POST /api/token/refresh` - exchange a refresh token for a new access token
///
/// Both are public. Inactive accounts get neither.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use lms_shared::{
    auth::{jwt::TokenPair, password},
    models::user::User,
    store::Directory,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const INVALID_CREDENTIALS: &str = "No active account found with the given credentials";

/// Login request
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
}

/// Refresh request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Refresh response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// Obtain a token pair
///
/// ```text
/// POST /api/token
/// {"email": "student@example.com", "password": "..."}
/// ```
///
/// # Response
///
/// ```json
/// {"access": "eyJ...", "refresh": "eyJ..."}
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: unknown email, wrong password or inactive account
pub async fn obtain_token(
    State(state): State<AppState>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> ApiResult<Json<TokenPair>> {
    let Json(req) = body?;

    let user = User::find_by_email(&state.db, req.email.trim())
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    // Same answer for every failure so accounts cannot be probed
    if !password::verify_password(&req.password, &user.password_hash)? || !user.is_active {
        debug!(user_id = %user.id, "Rejected login");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    User::update_last_login(&state.db, user.id).await?;

    let pair = state.tokens.issue_pair(user.id)?;

    info!(user_id = %user.id, "User logged in");

    Ok(Json(pair))
}

/// Refresh an access token
///
/// ```text
/// POST /api/token/refresh
/// {"refresh": "eyJ..."}
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: invalid or expired refresh token, or the account
///   has been deactivated since login
pub async fn refresh_token(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Json<RefreshResponse>> {
    let Json(req) = body?;

    let (user_id, access) = state.tokens.refresh(&req.refresh)?;

    if state.store.active_account(user_id).await?.is_none() {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    Ok(Json(RefreshResponse { access }))
}
