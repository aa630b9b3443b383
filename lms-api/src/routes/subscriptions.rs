/// Course subscription toggle
///
/// ```text
/// POST /api/course-subscriptions
/// {"course_id": "..."}
/// ```
///
/// # Response
///
/// ```json
/// {"message": "subscription added", "is_subscribed": true}
/// ```
///
/// Calling it again removes the subscription. A missing course is 404.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::rejection::JsonRejection, extract::State, Extension, Json};
use lms_shared::{
    auth::{actor::Actor, authorization::require_authenticated},
    subscriptions::toggle_subscription,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    #[serde(alias = "course")]
    pub course_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub message: &'static str,
    pub is_subscribed: bool,
}

pub async fn toggle(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Result<Json<ToggleRequest>, JsonRejection>,
) -> ApiResult<Json<ToggleResponse>> {
    let user_id = require_authenticated(&actor)?.user_id;
    let Json(req) = body?;

    let outcome = toggle_subscription(&state.store, user_id, req.course_id).await?;

    Ok(Json(ToggleResponse {
        message: outcome.message(),
        is_subscribed: outcome.is_subscribed,
    }))
}
