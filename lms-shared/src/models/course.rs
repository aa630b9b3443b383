/// Course model and database operations
///
/// A course is owned by at most one user (the owner may be removed, which
/// leaves `owner_id` NULL). `last_notification_sent_at` backs the
/// notification throttle and is only ever moved forward.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE courses (
///     id UUID PRIMARY KEY,
///     title VARCHAR(255) NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     preview TEXT,
///     owner_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     last_notification_sent_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use lms_shared::models::course::{Course, CreateCourse};
/// # use sqlx::PgPool;
/// # use uuid::Uuid;
/// # async fn example(pool: PgPool, owner_id: Uuid) -> Result<(), sqlx::Error> {
/// let course = Course::create(&pool, CreateCourse {
///     title: "Rust for beginners".to_string(),
///     description: "Ownership, borrowing, lifetimes".to_string(),
///     preview: None,
///     owner_id: Some(owner_id),
/// }).await?;
///
/// let view = Course::find_view(&pool, course.id, Some(owner_id)).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

const COURSE_COLUMNS: &str =
    "id, title, description, preview, owner_id, last_notification_sent_at, created_at, updated_at";

/// Course record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Course {
    pub id: Uuid,

    /// Course title (at most 255 characters)
    pub title: String,

    pub description: String,

    /// Preview image path or URL
    pub preview: Option<String>,

    /// Owning user; None once the owner has been deleted
    pub owner_id: Option<Uuid>,

    /// When subscribers were last notified about this course
    pub last_notification_sent_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Course together with the per-viewer fields returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CourseView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub course: Course,

    /// Number of lessons in the course
    pub lessons_count: i64,

    /// Whether the viewing user is subscribed
    pub is_subscribed: bool,
}

/// Input for creating a course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCourse {
    pub title: String,
    pub description: String,
    pub preview: Option<String>,
    pub owner_id: Option<Uuid>,
}

/// Input for updating a course. Only non-None fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCourse {
    pub title: Option<String>,
    pub description: Option<String>,
    pub preview: Option<Option<String>>,
}

impl Course {
    /// Creates a new course
    pub async fn create(pool: &PgPool, data: CreateCourse) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO courses (id, title, description, preview, owner_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COURSE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Course>(&query)
            .bind(Uuid::new_v4())
            .bind(data.title)
            .bind(data.description)
            .bind(data.preview)
            .bind(data.owner_id)
            .fetch_one(pool)
            .await
    }

    /// Finds a course by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1");

        sqlx::query_as::<_, Course>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Checks whether a course exists
    pub async fn exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM courses WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await?;

        Ok(exists)
    }

    /// Finds a course with its lesson count and the viewer's subscription flag
    pub async fn find_view(
        pool: &PgPool,
        id: Uuid,
        viewer_id: Option<Uuid>,
    ) -> Result<Option<CourseView>, sqlx::Error> {
        sqlx::query_as::<_, CourseView>(
            r#"
            SELECT c.id, c.title, c.description, c.preview, c.owner_id,
                   c.last_notification_sent_at, c.created_at, c.updated_at,
                   (SELECT COUNT(*) FROM lessons l WHERE l.course_id = c.id) AS lessons_count,
                   EXISTS (
                       SELECT 1 FROM subscriptions s
                       WHERE s.course_id = c.id AND s.user_id = $2
                   ) AS is_subscribed
            FROM courses c
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .bind(viewer_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists courses, optionally restricted to one owner, oldest first
    ///
    /// `owner_id = None` returns every course.
    pub async fn list_views(
        pool: &PgPool,
        owner_id: Option<Uuid>,
        viewer_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CourseView>, sqlx::Error> {
        sqlx::query_as::<_, CourseView>(
            r#"
            SELECT c.id, c.title, c.description, c.preview, c.owner_id,
                   c.last_notification_sent_at, c.created_at, c.updated_at,
                   (SELECT COUNT(*) FROM lessons l WHERE l.course_id = c.id) AS lessons_count,
                   EXISTS (
                       SELECT 1 FROM subscriptions s
                       WHERE s.course_id = c.id AND s.user_id = $2
                   ) AS is_subscribed
            FROM courses c
            WHERE ($1::uuid IS NULL OR c.owner_id = $1)
            ORDER BY c.created_at, c.id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(owner_id)
        .bind(viewer_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Counts courses, optionally restricted to one owner
    pub async fn count(pool: &PgPool, owner_id: Option<Uuid>) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM courses WHERE ($1::uuid IS NULL OR owner_id = $1)",
        )
        .bind(owner_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Updates a course. Only non-None fields are written.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateCourse,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE courses SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.title.is_some() {
            bind_count += 1;
            query.push_str(&format!(", title = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.preview.is_some() {
            bind_count += 1;
            query.push_str(&format!(", preview = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {COURSE_COLUMNS}"));

        let mut q = sqlx::query_as::<_, Course>(&query).bind(id);

        if let Some(title) = data.title {
            q = q.bind(title);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(preview) = data.preview {
            q = q.bind(preview);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a course and, by cascade, its lessons and subscriptions
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Reads `last_notification_sent_at` while holding a row lock
    ///
    /// Must run inside a transaction; the lock is released on commit.
    ///
    /// # Returns
    ///
    /// `None` if the course does not exist, `Some(last_sent)` otherwise
    pub async fn lock_notification_stamp(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Option<DateTime<Utc>>>, sqlx::Error> {
        let row: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(
            "SELECT last_notification_sent_at FROM courses WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(row.map(|(last_sent,)| last_sent))
    }

    /// Moves `last_notification_sent_at` forward to `at`
    ///
    /// Never moves the stamp backwards.
    pub async fn stamp_notification(
        conn: &mut PgConnection,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE courses
            SET last_notification_sent_at = $2
            WHERE id = $1
              AND (last_notification_sent_at IS NULL OR last_notification_sent_at <= $2)
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_course_default() {
        let update = UpdateCourse::default();
        assert!(update.title.is_none());
        assert!(update.description.is_none());
        assert!(update.preview.is_none());
    }

    #[test]
    fn test_course_view_serializes_flat() {
        let view = CourseView {
            course: Course {
                id: Uuid::new_v4(),
                title: "Algebra".to_string(),
                description: String::new(),
                preview: None,
                owner_id: None,
                last_notification_sent_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            lessons_count: 3,
            is_subscribed: true,
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["title"], "Algebra");
        assert_eq!(json["lessons_count"], 3);
        assert_eq!(json["is_subscribed"], true);
    }
}
