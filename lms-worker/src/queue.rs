/// Job queue over the `jobs` table
///
/// # Lifecycle
///
/// ```text
/// pending ──claim──> running ──ok──> succeeded
///    ^                  │
///    └──retry (backoff)─┤
///                       └──attempts exhausted──> failed
/// ```
///
/// Claiming uses `FOR UPDATE SKIP LOCKED`, so several workers can poll the
/// same table without handing one job to two of them. State changes out of
/// `running` are guarded by `state = 'running'`; a job reset by
/// [`JobQueue::reset_stale`] while its worker was still busy cannot be
/// finished twice.
///
/// # Example
///
/// ```no_run
/// use lms_worker::queue::JobQueue;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let queue = JobQueue::new(pool);
///
/// for job in queue.claim(10).await? {
///     println!("Claimed job {} ({})", job.id, job.kind);
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use lms_shared::models::job::{Job, JobState};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

/// First retry delay
pub const BASE_RETRY_DELAY: Duration = Duration::seconds(30);

/// Upper bound on the retry delay
pub const MAX_RETRY_DELAY: Duration = Duration::hours(1);

/// Running jobs older than this are assumed orphaned by a crashed worker
pub const STALE_AFTER: Duration = Duration::minutes(15);

/// Job queue error
#[derive(Debug, Error)]
pub enum QueueError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Job missing or no longer running
    #[error("Job not found or not running: {0}")]
    JobNotFound(Uuid),
}

/// Where a failed attempt leaves the job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back to pending, claimable again at `run_at`
    Retry { attempts: i32, run_at: DateTime<Utc> },

    /// Attempts exhausted
    Failed { attempts: i32 },
}

impl FailureOutcome {
    pub fn state(&self) -> JobState {
        match self {
            FailureOutcome::Retry { .. } => JobState::Pending,
            FailureOutcome::Failed { .. } => JobState::Failed,
        }
    }
}

/// Delay before the next attempt, `attempts` being the failures so far
///
/// 30s, 1m, 2m, 4m ... capped at one hour.
pub fn retry_delay(attempts: i32) -> Duration {
    let exponent = (attempts.max(1) - 1).min(16) as u32;
    let seconds = BASE_RETRY_DELAY.num_seconds() * 2i64.pow(exponent);
    Duration::seconds(seconds).min(MAX_RETRY_DELAY)
}

/// Decides the outcome of a failed attempt
pub fn next_after_failure(
    attempts: i32,
    max_attempts: i32,
    retryable: bool,
    now: DateTime<Utc>,
) -> FailureOutcome {
    let attempts = attempts + 1;

    if retryable && attempts < max_attempts {
        FailureOutcome::Retry {
            attempts,
            run_at: now + retry_delay(attempts),
        }
    } else {
        FailureOutcome::Failed { attempts }
    }
}

/// Job queue
#[derive(Clone)]
pub struct JobQueue {
    db: PgPool,
}

impl JobQueue {
    pub fn new(db: PgPool) -> Self {
        JobQueue { db }
    }

    /// Claims up to `limit` due jobs, oldest `run_at` first
    pub async fn claim(&self, limit: usize) -> Result<Vec<Job>, QueueError> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            WITH due AS (
                SELECT id
                FROM jobs
                WHERE state = $1 AND run_at <= NOW()
                ORDER BY run_at ASC, created_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET
                state = $3,
                started_at = NOW(),
                updated_at = NOW()
            FROM due
            WHERE jobs.id = due.id
            RETURNING jobs.*
            "#,
        )
        .bind(JobState::Pending.as_str())
        .bind(limit as i64)
        .bind(JobState::Running.as_str())
        .fetch_all(&self.db)
        .await?;

        if !jobs.is_empty() {
            tracing::debug!(count = jobs.len(), "Claimed jobs");
        }

        Ok(jobs)
    }

    /// Marks a running job as succeeded and stores its result
    pub async fn mark_succeeded(&self, job_id: Uuid, result: &JsonValue) -> Result<(), QueueError> {
        let outcome = sqlx::query(
            r#"
            UPDATE jobs
            SET
                state = $2,
                result = $3,
                last_error = NULL,
                finished_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND state = $4
            "#,
        )
        .bind(job_id)
        .bind(JobState::Succeeded.as_str())
        .bind(result)
        .bind(JobState::Running.as_str())
        .execute(&self.db)
        .await?;

        if outcome.rows_affected() == 0 {
            return Err(QueueError::JobNotFound(job_id));
        }

        tracing::info!(job_id = %job_id, "Job succeeded");
        Ok(())
    }

    /// Records a failed attempt
    ///
    /// Non-retryable failures (e.g. an undecodable payload) go straight to
    /// `failed` regardless of the remaining attempts.
    pub async fn mark_failed(
        &self,
        job: &Job,
        error: &str,
        retryable: bool,
    ) -> Result<FailureOutcome, QueueError> {
        let outcome = next_after_failure(job.attempts, job.max_attempts, retryable, Utc::now());

        let (attempts, run_at, finished) = match outcome {
            FailureOutcome::Retry { attempts, run_at } => (attempts, run_at, false),
            FailureOutcome::Failed { attempts } => (attempts, job.run_at, true),
        };

        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET
                state = $2,
                attempts = $3,
                run_at = $4,
                last_error = $5,
                finished_at = CASE WHEN $6 THEN NOW() ELSE NULL END,
                updated_at = NOW()
            WHERE id = $1 AND state = $7
            "#,
        )
        .bind(job.id)
        .bind(outcome.state().as_str())
        .bind(attempts)
        .bind(run_at)
        .bind(error)
        .bind(finished)
        .bind(JobState::Running.as_str())
        .execute(&self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(QueueError::JobNotFound(job.id));
        }

        match outcome {
            FailureOutcome::Retry { attempts, run_at } => tracing::warn!(
                job_id = %job.id,
                kind = %job.kind,
                attempts,
                retry_at = %run_at,
                error,
                "Job failed, will retry"
            ),
            FailureOutcome::Failed { attempts } => tracing::error!(
                job_id = %job.id,
                kind = %job.kind,
                attempts,
                error,
                "Job failed permanently"
            ),
        }

        Ok(outcome)
    }

    /// Returns jobs stuck in `running` since before `now - STALE_AFTER` to pending
    pub async fn reset_stale(&self) -> Result<u64, QueueError> {
        let cutoff = Utc::now() - STALE_AFTER;

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET
                state = $1,
                started_at = NULL,
                updated_at = NOW()
            WHERE state = $2 AND started_at < $3
            "#,
        )
        .bind(JobState::Pending.as_str())
        .bind(JobState::Running.as_str())
        .bind(cutoff)
        .execute(&self.db)
        .await?;

        let count = result.rows_affected();
        if count > 0 {
            tracing::warn!(count, "Returned stale running jobs to the queue");
        }

        Ok(count)
    }

    /// Number of pending jobs, due or not
    pub async fn pending_count(&self) -> Result<i64, QueueError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE state = $1")
            .bind(JobState::Pending.as_str())
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        assert_eq!(retry_delay(1), Duration::seconds(30));
        assert_eq!(retry_delay(2), Duration::seconds(60));
        assert_eq!(retry_delay(3), Duration::minutes(2));
        assert_eq!(retry_delay(7), Duration::minutes(32));
        assert_eq!(retry_delay(8), Duration::hours(1));
        assert_eq!(retry_delay(50), Duration::hours(1));
        assert_eq!(retry_delay(0), Duration::seconds(30));
    }

    #[test]
    fn test_failure_retries_until_attempts_exhausted() {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();

        assert_eq!(
            next_after_failure(0, 5, true, now),
            FailureOutcome::Retry {
                attempts: 1,
                run_at: now + Duration::seconds(30)
            }
        );
        assert_eq!(
            next_after_failure(3, 5, true, now),
            FailureOutcome::Retry {
                attempts: 4,
                run_at: now + Duration::minutes(4)
            }
        );
        assert_eq!(next_after_failure(4, 5, true, now), FailureOutcome::Failed { attempts: 5 });
    }

    #[test]
    fn test_non_retryable_fails_immediately() {
        let now = Utc::now();
        let outcome = next_after_failure(0, 5, false, now);

        assert_eq!(outcome, FailureOutcome::Failed { attempts: 1 });
        assert_eq!(outcome.state(), JobState::Failed);
    }
}
