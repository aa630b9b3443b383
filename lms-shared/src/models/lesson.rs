/// Lesson model and database operations
///
/// Lessons belong to exactly one course and are deleted with it. The video
/// URL is checked against the host allow-list before it reaches this layer
/// (see [`crate::validation::validate_video_url`]).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE lessons (
///     id UUID PRIMARY KEY,
///     course_id UUID NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     preview TEXT,
///     video_url TEXT NOT NULL,
///     owner_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const LESSON_COLUMNS: &str =
    "id, course_id, title, description, preview, video_url, owner_id, created_at, updated_at";

/// Lesson record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lesson {
    pub id: Uuid,

    /// Parent course
    pub course_id: Uuid,

    pub title: String,

    pub description: String,

    pub preview: Option<String>,

    /// Video link on an allow-listed host
    pub video_url: String,

    /// Owning user; None once the owner has been deleted
    pub owner_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating a lesson
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLesson {
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    pub preview: Option<String>,
    pub video_url: String,
    pub owner_id: Option<Uuid>,
}

/// Input for updating a lesson. Only non-None fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLesson {
    pub course_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub preview: Option<Option<String>>,
    pub video_url: Option<String>,
}

impl Lesson {
    /// Creates a new lesson
    ///
    /// # Errors
    ///
    /// Fails with a foreign key violation if `course_id` does not exist.
    pub async fn create(pool: &PgPool, data: CreateLesson) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO lessons (id, course_id, title, description, preview, video_url, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {LESSON_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Lesson>(&query)
            .bind(Uuid::new_v4())
            .bind(data.course_id)
            .bind(data.title)
            .bind(data.description)
            .bind(data.preview)
            .bind(data.video_url)
            .bind(data.owner_id)
            .fetch_one(pool)
            .await
    }

    /// Finds a lesson by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1");

        sqlx::query_as::<_, Lesson>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists lessons, optionally restricted to one owner, oldest first
    pub async fn list(
        pool: &PgPool,
        owner_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {LESSON_COLUMNS}
            FROM lessons
            WHERE ($1::uuid IS NULL OR owner_id = $1)
            ORDER BY created_at, id
            LIMIT $2 OFFSET $3
            "#
        );

        sqlx::query_as::<_, Lesson>(&query)
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Counts lessons, optionally restricted to one owner
    pub async fn count(pool: &PgPool, owner_id: Option<Uuid>) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM lessons WHERE ($1::uuid IS NULL OR owner_id = $1)",
        )
        .bind(owner_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Updates a lesson. Only non-None fields are written.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateLesson,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE lessons SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.course_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(", course_id = ${}", bind_count));
        }
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
        if data.video_url.is_some() {
            bind_count += 1;
            query.push_str(&format!(", video_url = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {LESSON_COLUMNS}"));

        let mut q = sqlx::query_as::<_, Lesson>(&query).bind(id);

        if let Some(course_id) = data.course_id {
            q = q.bind(course_id);
        }
        if let Some(title) = data.title {
            q = q.bind(title);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(preview) = data.preview {
            q = q.bind(preview);
        }
        if let Some(video_url) = data.video_url {
            q = q.bind(video_url);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a lesson
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_lesson_default() {
        let update = UpdateLesson::default();
        assert!(update.course_id.is_none());
        assert!(update.video_url.is_none());
        assert!(update.preview.is_none());
    }
}
