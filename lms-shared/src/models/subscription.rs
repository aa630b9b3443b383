/// Subscription model and database operations
///
/// A row in `subscriptions` means "user is subscribed to course". The pair
/// `(user_id, course_id)` is unique; the constraint is the authority when
/// two toggles race.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Subscription record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Inserts the pair unless it already exists
    ///
    /// # Returns
    ///
    /// True if this call created the row, false if it was already present
    ///
    /// # Errors
    ///
    /// Fails with a foreign key violation if the user or course is gone.
    pub async fn insert_if_absent(
        pool: &PgPool,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (id, user_id, course_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, course_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(course_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes the pair if present
    ///
    /// # Returns
    ///
    /// True if a row was deleted
    pub async fn remove(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> Result<bool, sqlx::Error> {
        let removed: Option<(Uuid,)> = sqlx::query_as(
            r#"
            DELETE FROM subscriptions
            WHERE user_id = $1 AND course_id = $2
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(pool)
        .await?;

        Ok(removed.is_some())
    }

    /// Checks whether the pair exists
    pub async fn exists(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM subscriptions WHERE user_id = $1 AND course_id = $2)",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Email addresses of the active users subscribed to a course
    pub async fn subscriber_emails(pool: &PgPool, course_id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT u.email
            FROM subscriptions s
            JOIN users u ON u.id = s.user_id
            WHERE s.course_id = $1 AND u.is_active
            ORDER BY s.created_at, u.email
            "#,
        )
        .bind(course_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|(email,)| email).collect())
    }
}
