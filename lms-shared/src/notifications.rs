/// Course update notifications
///
/// Two entry points decide whether subscribers hear about a change:
///
/// - [`notify_after_lesson_update`]: throttled. At most one notification per
///   course per [`THROTTLE_WINDOW`], however many lessons change.
/// - [`notify_after_course_update`]: unconditional, and does not touch the
///   throttle stamp.
///
/// Neither sends mail. Both hand a `notify_course_updated` job to the
/// worker; the throttle check, the stamp and the enqueue happen in one
/// atomic store operation so two simultaneous lesson edits cannot both
/// pass.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::job::{JobPayload, NewJob};
use crate::store::{JobSink, StampOutcome, StoreError, ThrottleStore};

/// Minimum interval between two throttled notifications for one course
pub const THROTTLE_WINDOW: Duration = Duration::hours(4);

/// Error type for notification hand-off
#[derive(Debug, thiserror::Error)]
pub enum ThrottleError {
    #[error("Course not found")]
    CourseNotFound,

    /// The job sink refused the job (dedupe conflict)
    #[error("Notification job was not enqueued")]
    NotEnqueued,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the throttle decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleOutcome {
    /// Job handed to the worker
    Enqueued { job_id: Uuid },

    /// Suppressed; the next notification may go out at `next_allowed_at`
    Throttled { next_allowed_at: DateTime<Utc> },
}

/// True if a notification may be sent at `now`
///
/// The window is closed on the left: exactly `window` after the last stamp
/// is already allowed.
pub fn window_elapsed(last_sent_at: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> bool {
    match last_sent_at {
        None => true,
        Some(last) => now - last >= window,
    }
}

/// Throttled hand-off after a lesson of `course_id` changed
pub async fn notify_after_lesson_update<S>(
    store: &S,
    course_id: Uuid,
    now: DateTime<Utc>,
) -> Result<ThrottleOutcome, ThrottleError>
where
    S: ThrottleStore + ?Sized,
{
    let job = NewJob::now(JobPayload::NotifyCourseUpdated { course_id }).run_at(now);

    match store
        .stamp_and_enqueue_if_elapsed(course_id, now, THROTTLE_WINDOW, job)
        .await?
    {
        StampOutcome::CourseMissing => Err(ThrottleError::CourseNotFound),
        StampOutcome::Stamped { job_id } => {
            info!(course_id = %course_id, job_id = %job_id, "Course update notification enqueued");
            Ok(ThrottleOutcome::Enqueued { job_id })
        }
        StampOutcome::WithinWindow { last_sent_at } => {
            let next_allowed_at = last_sent_at + THROTTLE_WINDOW;
            debug!(
                course_id = %course_id,
                next_allowed_at = %next_allowed_at,
                "Course update notification throttled"
            );
            Ok(ThrottleOutcome::Throttled { next_allowed_at })
        }
    }
}

/// Unconditional hand-off after a course was edited directly
///
/// # Returns
///
/// ID of the enqueued job
pub async fn notify_after_course_update<S>(store: &S, course_id: Uuid) -> Result<Uuid, ThrottleError>
where
    S: JobSink + ?Sized,
{
    let job = NewJob::now(JobPayload::NotifyCourseUpdated { course_id });

    let job_id = store.enqueue(job).await?.ok_or(ThrottleError::NotEnqueued)?;

    info!(course_id = %course_id, job_id = %job_id, "Course update notification enqueued");
    Ok(job_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use std::sync::Arc;

    fn at(hours: i64, minutes: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
            + Duration::hours(hours)
            + Duration::minutes(minutes)
    }

    #[test]
    fn test_window_elapsed_boundaries() {
        let last = at(0, 0);
        assert!(window_elapsed(None, last, THROTTLE_WINDOW));
        assert!(!window_elapsed(Some(last), at(3, 59), THROTTLE_WINDOW));
        assert!(window_elapsed(Some(last), at(4, 0), THROTTLE_WINDOW));
        assert!(window_elapsed(Some(last), at(9, 0), THROTTLE_WINDOW));
    }

    #[tokio::test]
    async fn test_two_updates_within_window_enqueue_once() {
        let store = InMemoryStore::new();
        let course = store.add_course("Course", None).await;

        let first = notify_after_lesson_update(&store, course, at(0, 0)).await.unwrap();
        let second = notify_after_lesson_update(&store, course, at(1, 30)).await.unwrap();

        assert!(matches!(first, ThrottleOutcome::Enqueued { .. }));
        assert_eq!(second, ThrottleOutcome::Throttled { next_allowed_at: at(4, 0) });
        assert_eq!(store.jobs().await.len(), 1);
        assert_eq!(store.course(course).await.unwrap().last_notification_sent_at, Some(at(0, 0)));
    }

    #[tokio::test]
    async fn test_update_exactly_at_boundary_enqueues() {
        let store = InMemoryStore::new();
        let course = store.add_course("Course", None).await;

        notify_after_lesson_update(&store, course, at(0, 0)).await.unwrap();
        let outcome = notify_after_lesson_update(&store, course, at(4, 0)).await.unwrap();

        assert!(matches!(outcome, ThrottleOutcome::Enqueued { .. }));
        assert_eq!(store.jobs().await.len(), 2);
        assert_eq!(store.course(course).await.unwrap().last_notification_sent_at, Some(at(4, 0)));
    }

    #[tokio::test]
    async fn test_missing_course() {
        let store = InMemoryStore::new();
        let result = notify_after_lesson_update(&store, Uuid::new_v4(), at(0, 0)).await;
        assert!(matches!(result, Err(ThrottleError::CourseNotFound)));
        assert!(store.jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_course_update_is_unconditional() {
        let store = InMemoryStore::new();
        let course = store.add_course("Course", None).await;

        notify_after_lesson_update(&store, course, at(0, 0)).await.unwrap();
        notify_after_course_update(&store, course).await.unwrap();
        notify_after_course_update(&store, course).await.unwrap();

        assert_eq!(store.jobs().await.len(), 3);
        // Direct course edits leave the throttle stamp alone
        assert_eq!(store.course(course).await.unwrap().last_notification_sent_at, Some(at(0, 0)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lesson_updates_pass_once() {
        let store = Arc::new(InMemoryStore::new());
        let course = store.add_course("Course", None).await;
        let now = at(0, 0);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { notify_after_lesson_update(store.as_ref(), course, now).await })
            })
            .collect();

        let mut enqueued = 0;
        for handle in handles {
            if let ThrottleOutcome::Enqueued { .. } = handle.await.unwrap().unwrap() {
                enqueued += 1;
            }
        }

        assert_eq!(enqueued, 1);
        assert_eq!(store.jobs().await.len(), 1);
    }
}
