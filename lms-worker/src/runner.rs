/// Job dispatch
///
/// [`JobRunner`] maps a decoded [`JobPayload`] to its handler and returns
/// the handler's result as JSON, which the orchestrator stores on the job
/// row. Every execution is bounded by [`JOB_TIMEOUT`]; a handler that runs
/// past it is abandoned and the attempt counts as failed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lms_shared::models::job::JobPayload;
use lms_shared::store::{NotificationDirectory, UserMaintenance};
use serde_json::{json, Value as JsonValue};

use crate::jobs::{deactivate_inactive_users, notify_course_updated, JobError};
use crate::mailer::Mailer;

/// Execution limit for one attempt
pub const JOB_TIMEOUT: Duration = Duration::from_secs(300);

/// Dependencies shared by every job execution
#[derive(Clone)]
pub struct JobRunner {
    directory: Arc<dyn NotificationDirectory>,
    users: Arc<dyn UserMaintenance>,
    mailer: Arc<dyn Mailer>,
    from_email: String,
    timeout: Duration,
}

impl JobRunner {
    pub fn new(
        directory: Arc<dyn NotificationDirectory>,
        users: Arc<dyn UserMaintenance>,
        mailer: Arc<dyn Mailer>,
        from_email: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            users,
            mailer,
            from_email: from_email.into(),
            timeout: JOB_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs a payload to completion or timeout
    pub async fn run(&self, payload: &JobPayload) -> Result<JsonValue, JobError> {
        match tokio::time::timeout(self.timeout, self.dispatch(payload)).await {
            Ok(result) => result,
            Err(_) => Err(JobError::TimedOut(self.timeout.as_secs())),
        }
    }

    async fn dispatch(&self, payload: &JobPayload) -> Result<JsonValue, JobError> {
        match payload {
            JobPayload::NotifyCourseUpdated { course_id } => {
                let summary = notify_course_updated::run(
                    self.directory.as_ref(),
                    self.mailer.as_ref(),
                    &self.from_email,
                    *course_id,
                )
                .await?;
                Ok(json!(summary))
            }
            JobPayload::DeactivateInactiveUsers { days } => {
                let count =
                    deactivate_inactive_users::run(self.users.as_ref(), *days, Utc::now()).await?;
                Ok(json!(count))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::RecordingMailer;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration};
    use lms_shared::store::memory::InMemoryStore;
    use lms_shared::store::StoreResult;
    use uuid::Uuid;

    fn runner(store: Arc<InMemoryStore>, mailer: RecordingMailer) -> JobRunner {
        JobRunner::new(store.clone(), store, Arc::new(mailer), "no-reply@example.com")
    }

    #[tokio::test]
    async fn test_notify_result_is_sent_object() {
        let store = Arc::new(InMemoryStore::new());
        let mailer = RecordingMailer::new();
        let course = store.add_course("Rust", None).await;
        let user = store.add_user("alice@example.com").await;
        store.subscribe(user, course).await;

        let result = runner(store, mailer.clone())
            .run(&JobPayload::NotifyCourseUpdated { course_id: course })
            .await
            .unwrap();

        assert_eq!(result, json!({"sent": 1}));
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_deactivation_result_is_count() {
        let store = Arc::new(InMemoryStore::new());
        let user = store.add_user("stale@example.com").await;
        store
            .set_last_login(user, Some(Utc::now() - ChronoDuration::days(60)))
            .await;

        let result = runner(store.clone(), RecordingMailer::new())
            .run(&JobPayload::DeactivateInactiveUsers { days: 30 })
            .await
            .unwrap();

        assert_eq!(result, json!(1));
        assert!(!store.user(user).await.unwrap().is_active);
    }

    struct SlowUsers;

    #[async_trait]
    impl UserMaintenance for SlowUsers {
        async fn deactivate_inactive_users(&self, _cutoff: DateTime<Utc>) -> StoreResult<u64> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_handler_times_out() {
        let store = Arc::new(InMemoryStore::new());
        let runner = JobRunner::new(
            store,
            Arc::new(SlowUsers),
            Arc::new(RecordingMailer::new()),
            "no-reply@example.com",
        )
        .with_timeout(Duration::from_secs(5));

        let err = runner
            .run(&JobPayload::DeactivateInactiveUsers { days: 30 })
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::TimedOut(5)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_course_is_not_an_error() {
        let store = Arc::new(InMemoryStore::new());
        let result = runner(store, RecordingMailer::new())
            .run(&JobPayload::NotifyCourseUpdated {
                course_id: Uuid::new_v4(),
            })
            .await
            .unwrap();

        assert_eq!(result, json!({"sent": 0}));
    }
}
