/// Health check endpoint
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "migrations": {"applied": 4, "known": 4, "latest_version": 20240101000004},
///   "pool": {"active_connections": 1, "idle_connections": 2, "total_connections": 3}
/// }
/// ```
///
/// Always answers 200; `status` is `degraded` when the database is
/// unreachable or migrations are behind.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use lms_shared::db::{
    migrations::{get_migration_status, MigrationStatus},
    pool::{get_pool_stats, health_check as ping, PoolStats},
};
use serde::Serialize;
use tracing::warn;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrations: Option<MigrationStatus>,

    pub pool: PoolStats,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let connected = match ping(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            false
        }
    };

    let migrations = if connected {
        match get_migration_status(&state.db).await {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(error = %e, "Could not read migration status");
                None
            }
        }
    } else {
        None
    };

    let healthy = connected && migrations.as_ref().is_some_and(MigrationStatus::is_up_to_date);

    Ok(Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database: if connected { "connected" } else { "disconnected" },
        migrations,
        pool: get_pool_stats(&state.db),
    }))
}
