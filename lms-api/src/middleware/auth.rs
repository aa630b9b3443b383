/// Actor resolution middleware
///
/// Runs on every `/api` request and inserts an [`Actor`] into the request
/// extensions. A token that fails validation, or whose user is gone or
/// inactive, yields [`Actor::Anonymous`]. Handlers then let the access
/// policy answer with 401 where authentication is required.

use crate::{app::AppState, error::ApiError};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use lms_shared::auth::actor::Actor;
use tracing::debug;

/// Extracts the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

/// Attaches the request [`Actor`]
///
/// # Errors
///
/// Only store failures surface (500); authentication failures never do.
pub async fn resolve_actor(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let actor = match bearer_token(req.headers()) {
        None => Actor::Anonymous,
        Some(token) => match state.tokens.validate_access(token) {
            Ok(claims) => Actor::resolve(&state.store, claims.sub).await?,
            Err(e) => {
                debug!(error = %e, "Rejected bearer token");
                Actor::Anonymous
            }
        },
    };

    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}
