/// Background job model
///
/// The `jobs` table is the hand-off between the API (which enqueues) and
/// `lms-worker` (which claims and executes). The payload is a tagged
/// [`JobPayload`] stored as JSONB; it is decoded by the worker at execution
/// time so that one malformed row cannot block the queue.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE jobs (
///     id UUID PRIMARY KEY,
///     kind TEXT NOT NULL,
///     payload JSONB NOT NULL,
///     state TEXT NOT NULL DEFAULT 'pending',
///     attempts INTEGER NOT NULL DEFAULT 0,
///     max_attempts INTEGER NOT NULL DEFAULT 5,
///     run_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     dedupe_key TEXT UNIQUE,
///     last_error TEXT,
///     result JSONB,
///     started_at TIMESTAMPTZ,
///     finished_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use lms_shared::models::job::{Job, JobPayload, NewJob};
/// # use sqlx::PgPool;
/// # use uuid::Uuid;
/// # async fn example(pool: PgPool, course_id: Uuid) -> Result<(), sqlx::Error> {
/// let job = NewJob::now(JobPayload::NotifyCourseUpdated { course_id });
/// let id = Job::enqueue(&pool, &job).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgExecutor;
use uuid::Uuid;

/// Default number of attempts before a job is marked failed
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Work item understood by the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// Email every subscriber of the course
    NotifyCourseUpdated { course_id: Uuid },

    /// Deactivate regular users whose last login is older than `days`
    DeactivateInactiveUsers { days: i64 },
}

impl JobPayload {
    /// Stored in `jobs.kind` for querying and logging
    pub fn kind(&self) -> &'static str {
        match self {
            JobPayload::NotifyCourseUpdated { .. } => "notify_course_updated",
            JobPayload::DeactivateInactiveUsers { .. } => "deactivate_inactive_users",
        }
    }
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting for `run_at`
    Pending,

    /// Claimed by a worker
    Running,

    Succeeded,

    /// Attempts exhausted
    Failed,
}

impl JobState {
    /// Converts state to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }

    /// Checks if state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// Error returned when a stored job state is not recognised
#[derive(Debug, thiserror::Error)]
#[error("Unknown job state: {0}")]
pub struct UnknownJobState(pub String);

impl TryFrom<String> for JobState {
    type Error = UnknownJobState;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(JobState::Pending),
            "running" => Ok(JobState::Running),
            "succeeded" => Ok(JobState::Succeeded),
            "failed" => Ok(JobState::Failed),
            _ => Err(UnknownJobState(value)),
        }
    }
}

/// Job row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,

    /// Mirrors the payload tag
    pub kind: String,

    /// Encoded [`JobPayload`]
    pub payload: JsonValue,

    #[sqlx(try_from = "String")]
    pub state: JobState,

    /// Failed attempts so far
    pub attempts: i32,

    pub max_attempts: i32,

    /// Earliest time the job may be claimed
    pub run_at: DateTime<Utc>,

    /// Unique key preventing duplicate enqueues (e.g. one deactivation run per day)
    pub dedupe_key: Option<String>,

    pub last_error: Option<String>,

    /// Handler output on success
    pub result: Option<JsonValue>,

    pub started_at: Option<DateTime<Utc>>,

    pub finished_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Decodes the stored payload
    pub fn decode_payload(&self) -> Result<JobPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Input for enqueueing a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    pub payload: JobPayload,
    pub run_at: DateTime<Utc>,
    pub max_attempts: i32,
    pub dedupe_key: Option<String>,
}

impl NewJob {
    /// A job that is due immediately, with default attempts and no dedupe key
    pub fn now(payload: JobPayload) -> Self {
        Self {
            payload,
            run_at: Utc::now(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            dedupe_key: None,
        }
    }

    /// Sets the dedupe key
    pub fn with_dedupe_key(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = Some(key.into());
        self
    }

    /// Sets the earliest run time
    pub fn run_at(mut self, run_at: DateTime<Utc>) -> Self {
        self.run_at = run_at;
        self
    }
}

impl Job {
    /// Inserts a pending job
    ///
    /// Works with a pool or with a connection inside a transaction.
    ///
    /// # Returns
    ///
    /// The new job ID, or None if a job with the same dedupe key exists
    pub async fn enqueue<'e, E>(executor: E, job: &NewJob) -> Result<Option<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let payload = serde_json::to_value(&job.payload)
            .map_err(|e| sqlx::Error::Protocol(format!("Job payload encoding failed: {}", e)))?;

        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO jobs (id, kind, payload, max_attempts, run_at, dedupe_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (dedupe_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job.payload.kind())
        .bind(payload)
        .bind(job.max_attempts)
        .bind(job.run_at)
        .bind(&job.dedupe_key)
        .fetch_optional(executor)
        .await?;

        Ok(row.map(|(id,)| id))
    }
}
