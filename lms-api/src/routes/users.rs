/// User endpoints
///
/// - `POST /api/users/register` - public registration
/// - `GET /api/users` - public profiles, any authenticated user
/// - `GET /api/users/:id` - full record for self and staff, public profile otherwise
/// - `PUT|PATCH /api/users/:id` - self or staff/superuser
/// - `DELETE /api/users/:id` - deactivates; users are never hard-deleted

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
        authorization::{authorize_account, require_authenticated},
        password,
    },
    models::user::{CreateUser, UpdateUser, User},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        email(message = "Enter a valid email address"),
        length(max = 254, message = "Ensure this field has no more than 254 characters")
    )]
    pub email: String,

    /// Plaintext, checked with `validate_password`
    pub password: String,

    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters"))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters"))]
    pub last_name: String,

    #[validate(length(max = 20, message = "Ensure this field has no more than 20 characters"))]
    pub phone: Option<String>,

    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters"))]
    pub city: Option<String>,

    pub avatar: Option<String>,
}

/// Partial account update (PATCH); PUT is converted into one with every field set
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UserPatch {
    #[validate(
        email(message = "Enter a valid email address"),
        length(max = 254, message = "Ensure this field has no more than 254 characters")
    )]
    pub email: Option<String>,

    pub password: Option<String>,

    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters"))]
    pub last_name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 20, message = "Ensure this field has no more than 20 characters"))]
    pub phone: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters"))]
    pub city: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub avatar: Option<Option<String>>,
}

/// Full account replacement (PUT)
#[derive(Debug, Deserialize)]
pub struct UserPut {
    pub email: String,
    pub password: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub avatar: Option<String>,
}

impl From<UserPut> for UserPatch {
    fn from(put: UserPut) -> Self {
        Self {
            email: Some(put.email),
            password: put.password,
            first_name: Some(put.first_name),
            last_name: Some(put.last_name),
            phone: Some(put.phone),
            city: Some(put.city),
            avatar: Some(put.avatar),
        }
    }
}

impl UserPatch {
    /// Validates and hashes into a model update
    fn into_update(mut self) -> ApiResult<UpdateUser> {
        if let Some(email) = self.email.as_mut() {
            *email = email.trim().to_string();
        }
        self.validate()?;

        let password_hash = match self.password {
            Some(plain) => {
                password::validate_password(&plain)?;
                Some(password::hash_password(&plain)?)
            }
            None => None,
        };

        Ok(UpdateUser {
            email: self.email,
            password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            city: self.city,
            avatar: self.avatar,
        })
    }
}

/// Profile visible to every authenticated user
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub city: Option<String>,
    pub avatar: Option<String>,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            city: user.city,
            avatar: user.avatar,
        }
    }
}

/// Either the full record or the public profile
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UserView {
    Full(User),
    Public(PublicProfile),
}

/// Register a user
///
/// ```text
/// POST /api/users/register
/// {"email": "student@example.com", "password": "correct horse", "city": "Kazan"}
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: invalid email, weak password, over-long field
/// - `409 Conflict`: email already registered (case-insensitive)
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let Json(mut req) = body?;

    req.email = req.email.trim().to_string();
    req.validate()?;
    password::validate_password(&req.password)?;

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            city: req.city,
            avatar: req.avatar,
        },
    )
    .await?;

    info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(user)))
}

/// List public profiles
pub async fn list_users(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    OriginalUri(uri): OriginalUri,
    params: Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Json<Page<PublicProfile>>> {
    require_authenticated(&actor)?;
    let Query(params) = params?;

    let pagination = Pagination::resolve(params, state.config.api.page_size)?;
    let count = User::count(&state.db).await?;
    let users = User::list(&state.db, pagination.limit(), pagination.offset()).await?;

    let results = users.into_iter().map(PublicProfile::from).collect();
    Ok(Json(Page::new(&uri, pagination, count, results)?))
}

/// Retrieve a user
pub async fn get_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserView>> {
    require_authenticated(&actor)?;

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    let view = if authorize_account(&actor, id).is_ok() {
        UserView::Full(user)
    } else {
        UserView::Public(user.into())
    };

    Ok(Json(view))
}

async fn apply_update(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
    patch: UserPatch,
) -> ApiResult<Json<User>> {
    require_authenticated(actor)?;

    if User::find_by_id(&state.db, id).await?.is_none() {
        return Err(ApiError::not_found());
    }
    authorize_account(actor, id)?;

    let update = patch.into_update()?;
    let user = User::update(&state.db, id, update)
        .await?
        .ok_or_else(ApiError::not_found)?;

    info!(user_id = %id, "User updated");

    Ok(Json(user))
}

/// Replace a user's writable fields
pub async fn replace_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    body: Result<Json<UserPut>, JsonRejection>,
) -> ApiResult<Json<User>> {
    require_authenticated(&actor)?;
    let Json(put) = body?;

    apply_update(&state, &actor, id, put.into()).await
}

/// Update some of a user's fields
pub async fn patch_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    body: Result<Json<UserPatch>, JsonRejection>,
) -> ApiResult<Json<User>> {
    require_authenticated(&actor)?;
    let Json(patch) = body?;

    apply_update(&state, &actor, id, patch).await
}

/// Deactivate a user
pub async fn deactivate_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_authenticated(&actor)?;

    if User::find_by_id(&state.db, id).await?.is_none() {
        return Err(ApiError::not_found());
    }
    authorize_account(&actor, id)?;

    User::deactivate(&state.db, id).await?;

    info!(user_id = %id, "User deactivated");

    Ok(StatusCode::NO_CONTENT)
}
