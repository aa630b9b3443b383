/// Course endpoints
///
/// - `GET /api/courses` - moderators see every course, others their own
/// - `POST /api/courses` - any non-moderator; the caller becomes the owner
/// - `GET|PUT|PATCH /api/courses/:id` - owner or moderator
/// - `DELETE /api/courses/:id` - owner, never a moderator
///
/// Responses carry `lessons_count` and the caller's `is_subscribed`. Every
/// successful update hands a `notify_course_updated` job to the worker.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{
        double_option,
        pagination::{Page, PageParams, Pagination},
    },
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        OriginalUri, Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use lms_shared::{
    auth::{
        actor::Actor,
        authorization::{authorize, list_scope, require_authenticated, Action},
    },
    models::course::{Course, CourseView, CreateCourse, UpdateCourse},
    notifications::notify_after_course_update,
    validation::validate_title,
};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

pub const TITLE_MAX_CHARS: usize = 255;

/// Create and PUT body
#[derive(Debug, Deserialize)]
pub struct CourseRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub preview: Option<String>,
}

/// PATCH body
#[derive(Debug, Default, Deserialize)]
pub struct CoursePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub preview: Option<Option<String>>,
}

impl From<CourseRequest> for CoursePatch {
    fn from(req: CourseRequest) -> Self {
        Self {
            title: Some(req.title),
            description: Some(req.description),
            preview: Some(req.preview),
        }
    }
}

impl CoursePatch {
    fn into_update(self) -> ApiResult<UpdateCourse> {
        if let Some(title) = &self.title {
            validate_title("title", title, TITLE_MAX_CHARS)?;
        }

        Ok(UpdateCourse {
            title: self.title,
            description: self.description,
            preview: self.preview,
        })
    }
}

/// List visible courses
pub async fn list_courses(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    OriginalUri(uri): OriginalUri,
    params: Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Json<Page<CourseView>>> {
    let owner = list_scope(&actor)?.owner_filter();
    let Query(params) = params?;

    let pagination = Pagination::resolve(params, state.config.api.page_size)?;
    let count = Course::count(&state.db, owner).await?;
    let results = Course::list_views(
        &state.db,
        owner,
        actor.user_id(),
        pagination.limit(),
        pagination.offset(),
    )
    .await?;

    Ok(Json(Page::new(&uri, pagination, count, results)?))
}

/// Create a course owned by the caller
///
/// # Errors
///
/// - `401 Unauthorized`: anonymous
/// - `403 Forbidden`: moderators cannot create
/// - `400 Bad Request`: blank or over-long title
pub async fn create_course(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Result<Json<CourseRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CourseView>)> {
    authorize(&actor, Action::Create, None)?;
    let Json(req) = body?;

    validate_title("title", &req.title, TITLE_MAX_CHARS)?;

    let course = Course::create(
        &state.db,
        CreateCourse {
            title: req.title,
            description: req.description,
            preview: req.preview,
            owner_id: actor.user_id(),
        },
    )
    .await?;

    info!(course_id = %course.id, owner_id = ?course.owner_id, "Course created");

    Ok((
        StatusCode::CREATED,
        Json(CourseView {
            course,
            lessons_count: 0,
            is_subscribed: false,
        }),
    ))
}

async fn load_authorized(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
    action: Action,
) -> ApiResult<CourseView> {
    require_authenticated(actor)?;

    let view = Course::find_view(&state.db, id, actor.user_id())
        .await?
        .ok_or_else(ApiError::not_found)?;

    authorize(actor, action, view.course.owner_id)?;

    Ok(view)
}

/// Retrieve a course
pub async fn get_course(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CourseView>> {
    let view = load_authorized(&state, &actor, id, Action::Retrieve).await?;
    Ok(Json(view))
}

async fn apply_update(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
    patch: CoursePatch,
) -> ApiResult<Json<CourseView>> {
    let update = patch.into_update()?;

    Course::update(&state.db, id, update)
        .await?
        .ok_or_else(ApiError::not_found)?;

    info!(course_id = %id, "Course updated");

    // The edit is committed; a failed hand-off is logged rather than reported
    if let Err(e) = notify_after_course_update(&state.store, id).await {
        error!(course_id = %id, error = %e, "Failed to enqueue course update notification");
    }

    let view = Course::find_view(&state.db, id, actor.user_id())
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok(Json(view))
}

/// Replace a course's writable fields
pub async fn replace_course(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    body: Result<Json<CourseRequest>, JsonRejection>,
) -> ApiResult<Json<CourseView>> {
    load_authorized(&state, &actor, id, Action::Update).await?;
    let Json(req) = body?;

    apply_update(&state, &actor, id, req.into()).await
}

/// Update some of a course's fields
pub async fn patch_course(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    body: Result<Json<CoursePatch>, JsonRejection>,
) -> ApiResult<Json<CourseView>> {
    load_authorized(&state, &actor, id, Action::Update).await?;
    let Json(patch) = body?;

    apply_update(&state, &actor, id, patch).await
}

/// Delete a course with its lessons and subscriptions
///
/// Refused with `409 Conflict` while payments reference the course or one
/// of its lessons.
pub async fn delete_course(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    load_authorized(&state, &actor, id, Action::Delete).await?;

    if !Course::delete(&state.db, id).await? {
        return Err(ApiError::not_found());
    }

    info!(course_id = %id, "Course deleted");

    Ok(StatusCode::NO_CONTENT)
}
