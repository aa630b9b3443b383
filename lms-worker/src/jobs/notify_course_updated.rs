/// `notify_course_updated` job
///
/// Sends one message about the course to all of its active subscribers,
/// addressed to the sender with the subscribers in Bcc so they never see
/// each other's addresses. Returns `{"sent": n}`.
///
/// A course deleted between enqueue and execution is not an error: the
/// job succeeds with `sent = 0`. Transport failures are errors and the
/// runner retries them.

use lms_shared::store::NotificationDirectory;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::JobError;
use crate::mailer::{Mailer, OutgoingEmail};

/// Job result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifySummary {
    pub sent: usize,
}

pub fn subject(title: &str) -> String {
    format!("Course updated: {}", title)
}

pub fn body(title: &str) -> String {
    format!(
        "The course \u{ab}{}\u{bb} has new material. Open the LMS to take a look.",
        title
    )
}

pub async fn run<D, M>(
    directory: &D,
    mailer: &M,
    from_email: &str,
    course_id: Uuid,
) -> Result<NotifySummary, JobError>
where
    D: NotificationDirectory + ?Sized,
    M: Mailer + ?Sized,
{
    let Some(title) = directory.course_title(course_id).await? else {
        warn!(course_id = %course_id, "Course no longer exists, nothing to send");
        return Ok(NotifySummary { sent: 0 });
    };

    let recipients = directory.subscriber_emails(course_id).await?;
    if recipients.is_empty() {
        info!(course_id = %course_id, "Course has no subscribers");
        return Ok(NotifySummary { sent: 0 });
    }

    let email = OutgoingEmail::bcc(from_email, recipients, subject(&title), body(&title));
    mailer.send(&email).await?;

    let sent = email.recipient_count();
    info!(course_id = %course_id, sent, mailer = mailer.name(), "Course update notification sent");

    Ok(NotifySummary { sent })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::{MailError, RecordingMailer};
    use lms_shared::store::memory::InMemoryStore;

    const FROM: &str = "no-reply@example.com";

    #[tokio::test]
    async fn test_sends_one_bcc_message_to_active_subscribers() {
        let store = InMemoryStore::new();
        let mailer = RecordingMailer::new();

        let course = store.add_course("Rust", None).await;
        let alice = store.add_user("alice@example.com").await;
        let bob = store.add_user("bob@example.com").await;
        let carol = store.add_user("carol@example.com").await;
        store.subscribe(alice, course).await;
        store.subscribe(bob, course).await;
        store.subscribe(carol, course).await;
        store.set_active(carol, false).await;

        let summary = run(&store, &mailer, FROM, course).await.unwrap();
        assert_eq!(summary, NotifySummary { sent: 2 });

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Course updated: Rust");
        assert_eq!(sent[0].to, vec![FROM]);

        let mut bcc = sent[0].bcc.clone();
        bcc.sort();
        assert_eq!(bcc, vec!["alice@example.com", "bob@example.com"]);
    }

    #[tokio::test]
    async fn test_no_subscribers_sends_nothing() {
        let store = InMemoryStore::new();
        let mailer = RecordingMailer::new();
        let course = store.add_course("Empty", None).await;

        let summary = run(&store, &mailer, FROM, course).await.unwrap();

        assert_eq!(summary.sent, 0);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_missing_course_succeeds_with_zero() {
        let store = InMemoryStore::new();
        let mailer = RecordingMailer::new();

        let summary = run(&store, &mailer, FROM, Uuid::new_v4()).await.unwrap();

        assert_eq!(summary.sent, 0);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_retryable_error() {
        let store = InMemoryStore::new();
        let mailer = RecordingMailer::new();
        mailer.fail_with(MailError::Transport("connection refused".to_string()));

        let course = store.add_course("Rust", None).await;
        let user = store.add_user("alice@example.com").await;
        store.subscribe(user, course).await;

        let err = run(&store, &mailer, FROM, course).await.unwrap_err();
        assert!(matches!(err, JobError::Mail(MailError::Transport(_))));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_summary_serializes_as_sent_object() {
        let json = serde_json::to_value(NotifySummary { sent: 3 }).unwrap();
        assert_eq!(json, serde_json::json!({"sent": 3}));
    }
}
