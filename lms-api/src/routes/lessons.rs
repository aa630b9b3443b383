/// Lesson endpoints
///
/// Same access rules as courses. Creating a lesson only requires the course
/// to exist, not to be owned by the caller. After an update the lesson's
/// course is run through the notification throttle, so subscribers hear
/// about lesson edits at most once per window.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{
        courses::TITLE_MAX_CHARS,
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
use chrono::Utc;
use lms_shared::{
    auth::{
        actor::Actor,
        authorization::{authorize, list_scope, require_authenticated, Action},
    },
    models::{
        course::Course,
        lesson::{CreateLesson, Lesson, UpdateLesson},
    },
    notifications::{notify_after_lesson_update, ThrottleError},
    validation::{validate_title, validate_video_url, FieldError},
};
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Create and PUT body
#[derive(Debug, Deserialize)]
pub struct LessonRequest {
    #[serde(alias = "course_id")]
    pub course: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub preview: Option<String>,
    pub video_url: String,
}

/// PATCH body
#[derive(Debug, Default, Deserialize)]
pub struct LessonPatch {
    #[serde(alias = "course_id")]
    pub course: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub preview: Option<Option<String>>,
    pub video_url: Option<String>,
}

impl From<LessonRequest> for LessonPatch {
    fn from(req: LessonRequest) -> Self {
        Self {
            course: Some(req.course),
            title: Some(req.title),
            description: Some(req.description),
            preview: Some(req.preview),
            video_url: Some(req.video_url),
        }
    }
}

fn missing_course() -> ApiError {
    FieldError::new("course", "Object with this ID does not exist").into()
}

impl LessonPatch {
    /// Field checks that need no database
    fn check_fields(&self) -> ApiResult<()> {
        if let Some(title) = &self.title {
            validate_title("title", title, TITLE_MAX_CHARS)?;
        }
        if let Some(url) = &self.video_url {
            validate_video_url(url)?;
        }
        Ok(())
    }

    fn into_update(self) -> UpdateLesson {
        UpdateLesson {
            course_id: self.course,
            title: self.title,
            description: self.description,
            preview: self.preview,
            video_url: self.video_url,
        }
    }
}

/// List visible lessons
pub async fn list_lessons(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    OriginalUri(uri): OriginalUri,
    params: Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Json<Page<Lesson>>> {
    let owner = list_scope(&actor)?.owner_filter();
    let Query(params) = params?;

    let pagination = Pagination::resolve(params, state.config.api.page_size)?;
    let count = Lesson::count(&state.db, owner).await?;
    let results = Lesson::list(&state.db, owner, pagination.limit(), pagination.offset()).await?;

    Ok(Json(Page::new(&uri, pagination, count, results)?))
}

/// Create a lesson owned by the caller
///
/// # Errors
///
/// - `401 Unauthorized`: anonymous
/// - `403 Forbidden`: moderators cannot create
/// - `400 Bad Request`: missing course (field `course`), blank title,
///   video link outside youtube.com
pub async fn create_lesson(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Result<Json<LessonRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Lesson>)> {
    authorize(&actor, Action::Create, None)?;
    let Json(req) = body?;

    validate_title("title", &req.title, TITLE_MAX_CHARS)?;
    validate_video_url(&req.video_url)?;

    if !Course::exists(&state.db, req.course).await? {
        return Err(missing_course());
    }

    let lesson = Lesson::create(
        &state.db,
        CreateLesson {
            course_id: req.course,
            title: req.title,
            description: req.description,
            preview: req.preview,
            video_url: req.video_url,
            owner_id: actor.user_id(),
        },
    )
    .await
    .map_err(|e| match e {
        // Course deleted between the check and the insert
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => missing_course(),
        other => other.into(),
    })?;

    info!(lesson_id = %lesson.id, course_id = %lesson.course_id, "Lesson created");

    Ok((StatusCode::CREATED, Json(lesson)))
}

async fn load_authorized(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
    action: Action,
) -> ApiResult<Lesson> {
    require_authenticated(actor)?;

    let lesson = Lesson::find_by_id(&state.db, id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    authorize(actor, action, lesson.owner_id)?;

    Ok(lesson)
}

/// Retrieve a lesson
pub async fn get_lesson(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Lesson>> {
    let lesson = load_authorized(&state, &actor, id, Action::Retrieve).await?;
    Ok(Json(lesson))
}

async fn apply_update(state: &AppState, id: Uuid, patch: LessonPatch) -> ApiResult<Json<Lesson>> {
    patch.check_fields()?;

    if let Some(course_id) = patch.course {
        if !Course::exists(&state.db, course_id).await? {
            return Err(missing_course());
        }
    }

    let lesson = Lesson::update(&state.db, id, patch.into_update())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => missing_course(),
            other => other.into(),
        })?
        .ok_or_else(ApiError::not_found)?;

    info!(lesson_id = %id, course_id = %lesson.course_id, "Lesson updated");

    // Throttled against the course the lesson belongs to now
    match notify_after_lesson_update(&state.store, lesson.course_id, Utc::now()).await {
        Ok(_) => {}
        Err(ThrottleError::CourseNotFound) => {
            warn!(course_id = %lesson.course_id, "Course vanished before notification");
        }
        Err(e) => {
            error!(course_id = %lesson.course_id, error = %e, "Notification throttle failed");
        }
    }

    Ok(Json(lesson))
}

/// Replace a lesson's writable fields
pub async fn replace_lesson(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    body: Result<Json<LessonRequest>, JsonRejection>,
) -> ApiResult<Json<Lesson>> {
    load_authorized(&state, &actor, id, Action::Update).await?;
    let Json(req) = body?;

    apply_update(&state, id, req.into()).await
}

/// Update some of a lesson's fields
pub async fn patch_lesson(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    body: Result<Json<LessonPatch>, JsonRejection>,
) -> ApiResult<Json<Lesson>> {
    load_authorized(&state, &actor, id, Action::Update).await?;
    let Json(patch) = body?;

    apply_update(&state, id, patch).await
}

/// Delete a lesson; `409 Conflict` while payments reference it
pub async fn delete_lesson(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    load_authorized(&state, &actor, id, Action::Delete).await?;

    if !Lesson::delete(&state.db, id).await? {
        return Err(ApiError::not_found());
    }

    info!(lesson_id = %id, "Lesson deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accepts_course_alias() {
        let id = Uuid::new_v4();
        let body = format!(
            r#"{{"course_id": "{}", "title": "Intro", "video_url": "https://youtube.com/watch?v=1"}}"#,
            id
        );
        let req: LessonRequest = serde_json::from_str(&body).unwrap();
        assert_eq!(req.course, id);
        assert_eq!(req.description, "");
    }

    #[test]
    fn test_patch_rejects_foreign_video_host() {
        let patch = LessonPatch {
            video_url: Some("https://vimeo.com/1".to_string()),
            ..Default::default()
        };
        match patch.check_fields().unwrap_err() {
            ApiError::ValidationError(details) => assert_eq!(details[0].field, "video_url"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_patch_passes_field_checks() {
        let patch = LessonPatch::default();
        assert!(patch.check_fields().is_ok());

        let update = patch.into_update();
        assert!(update.course_id.is_none());
        assert!(update.video_url.is_none());
    }
}
