/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use lms_api::{app::AppState, config::Config};
/// use lms_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(DatabaseConfig::new(config.database.url.clone())).await?;
/// let state = AppState::new(pool, config, None);
/// let app = lms_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{auth::resolve_actor, security::SecurityHeadersLayer},
    routes,
};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use chrono::Duration;
use lms_shared::{
    auth::jwt::TokenIssuer,
    payments::orchestrator::PaymentOrchestrator,
    store::postgres::PgStore,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned into every handler through `State`; all members are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Store ports over `db` for the core components
    pub store: PgStore,

    /// Application configuration
    pub config: Arc<Config>,

    /// Access/refresh token issuer
    pub tokens: Arc<TokenIssuer>,

    /// None when no payment provider is configured
    pub payments: Option<PaymentOrchestrator>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, payments: Option<PaymentOrchestrator>) -> Self {
        let tokens = TokenIssuer::new(
            config.jwt.secret.clone(),
            Duration::minutes(config.jwt.access_ttl_minutes),
            Duration::days(config.jwt.refresh_ttl_days),
        );

        Self {
            store: PgStore::new(db.clone()),
            db,
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            payments,
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /health                              GET
/// /api/token                           POST   (public)
/// /api/token/refresh                   POST   (public)
/// /api/users/register                  POST   (public)
/// /api/users                           GET
/// /api/users/:id                       GET PUT PATCH DELETE
/// /api/courses                         GET POST
/// /api/courses/:id                     GET PUT PATCH DELETE
/// /api/lessons                         GET POST
/// /api/lessons/:id                     GET PUT PATCH DELETE
/// /api/course-subscriptions            POST
/// /api/payments                        GET
/// /api/payments/create                 POST
/// ```
///
/// Every `/api` request passes through [`resolve_actor`], which attaches an
/// `Actor` to the request. Handlers apply the access policy themselves, so
/// public routes simply ignore it.
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let api_routes = Router::new()
        .route("/token", post(routes::auth::obtain_token))
        .route("/token/refresh", post(routes::auth::refresh_token))
        .route("/users/register", post(routes::users::register))
        .route("/users", get(routes::users::list_users))
        .route(
            "/users/:id",
            get(routes::users::get_user)
                .put(routes::users::replace_user)
                .patch(routes::users::patch_user)
                .delete(routes::users::deactivate_user),
        )
        .route(
            "/courses",
            get(routes::courses::list_courses).post(routes::courses::create_course),
        )
        .route(
            "/courses/:id",
            get(routes::courses::get_course)
                .put(routes::courses::replace_course)
                .patch(routes::courses::patch_course)
                .delete(routes::courses::delete_course),
        )
        .route(
            "/lessons",
            get(routes::lessons::list_lessons).post(routes::lessons::create_lesson),
        )
        .route(
            "/lessons/:id",
            get(routes::lessons::get_lesson)
                .put(routes::lessons::replace_lesson)
                .patch(routes::lessons::patch_lesson)
                .delete(routes::lessons::delete_lesson),
        )
        .route(
            "/course-subscriptions",
            post(routes::subscriptions::toggle),
        )
        .route("/payments", get(routes::payments::list_payments))
        .route("/payments/create", post(routes::payments::create_payment))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            resolve_actor,
        ));

    // Production never allows the wildcard
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") && !state.config.api.production {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter(|origin| origin.as_str() != "*")
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
