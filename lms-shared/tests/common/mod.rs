//! Shared helpers for integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use lms_shared::db::migrations::run_migrations;
use lms_shared::db::pool::{create_pool, DatabaseConfig};
use lms_shared::models::user::{CreateUser, User};
use sqlx::PgPool;
use uuid::Uuid;

/// Fixed reference instant so throttle arithmetic is exact
pub fn at(hours: i64, minutes: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default()
        + Duration::hours(hours)
        + Duration::minutes(minutes)
}

/// Connects to `DATABASE_URL` and applies migrations
pub async fn migrated_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = create_pool(DatabaseConfig::new(url).with_max_connections(5))
        .await
        .expect("Failed to connect to test database");
    run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

/// Inserts a user with a unique email
pub async fn create_user(pool: &PgPool) -> User {
    User::create(
        pool,
        CreateUser {
            email: format!("user-{}@example.com", Uuid::new_v4()),
            password_hash: "$argon2id$test".to_string(),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to create user")
}
