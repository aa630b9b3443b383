//! End-to-end policy flow over the in-memory store
//!
//! Owner A creates a course, B subscribes, A edits lessons and the course,
//! and the notification hand-off follows the throttle rules.

mod common;

use common::at;
use lms_shared::auth::actor::Actor;
use lms_shared::auth::authorization::{authorize, list_scope, AccessError, Action, ListScope};
use lms_shared::models::job::JobPayload;
use lms_shared::notifications::{
    notify_after_course_update, notify_after_lesson_update, ThrottleOutcome,
};
use lms_shared::store::memory::InMemoryStore;
use lms_shared::subscriptions::toggle_subscription;

#[tokio::test]
async fn test_owner_subscriber_notification_flow() {
    let store = InMemoryStore::new();
    let owner = store.add_user("a@example.com").await;
    let subscriber = store.add_user("b@example.com").await;
    let moderator = store.add_user("m@example.com").await;
    store.add_moderator(moderator).await;

    let owner_actor = Actor::resolve(&store, owner).await.unwrap();
    let subscriber_actor = Actor::resolve(&store, subscriber).await.unwrap();
    let moderator_actor = Actor::resolve(&store, moderator).await.unwrap();

    authorize(&owner_actor, Action::Create, None).unwrap();
    let course = store.add_course("Rust", Some(owner)).await;

    // B cannot touch A's course, the moderator can edit but not delete
    assert_eq!(
        authorize(&subscriber_actor, Action::Update, Some(owner)),
        Err(AccessError::Forbidden)
    );
    authorize(&moderator_actor, Action::Update, Some(owner)).unwrap();
    assert_eq!(
        authorize(&moderator_actor, Action::Delete, Some(owner)),
        Err(AccessError::Forbidden)
    );
    assert_eq!(list_scope(&subscriber_actor).unwrap(), ListScope::OwnedBy(subscriber));
    assert_eq!(list_scope(&moderator_actor).unwrap(), ListScope::All);

    assert!(toggle_subscription(&store, subscriber, course).await.unwrap().is_subscribed);

    // First lesson edit passes the throttle
    authorize(&owner_actor, Action::Update, Some(owner)).unwrap();
    let first = notify_after_lesson_update(&store, course, at(0, 0)).await.unwrap();
    assert!(matches!(first, ThrottleOutcome::Enqueued { .. }));

    // Unsubscribe and resubscribe in between does not reset the throttle
    assert!(!toggle_subscription(&store, subscriber, course).await.unwrap().is_subscribed);
    assert!(toggle_subscription(&store, subscriber, course).await.unwrap().is_subscribed);

    let second = notify_after_lesson_update(&store, course, at(2, 0)).await.unwrap();
    assert_eq!(second, ThrottleOutcome::Throttled { next_allowed_at: at(4, 0) });

    // A direct course edit always notifies
    notify_after_course_update(&store, course).await.unwrap();

    let third = notify_after_lesson_update(&store, course, at(4, 30)).await.unwrap();
    assert!(matches!(third, ThrottleOutcome::Enqueued { .. }));

    let jobs = store.jobs().await;
    assert_eq!(jobs.len(), 3);
    assert!(jobs
        .iter()
        .all(|queued| queued.job.payload == JobPayload::NotifyCourseUpdated { course_id: course }));
    assert_eq!(store.subscription_count(course).await, 1);
}

#[tokio::test]
async fn test_anonymous_is_unauthorized_everywhere() {
    let anonymous = Actor::Anonymous;

    assert_eq!(list_scope(&anonymous), Err(AccessError::Unauthorized));
    for action in [Action::Create, Action::Retrieve, Action::Update, Action::Delete] {
        assert_eq!(authorize(&anonymous, action, None), Err(AccessError::Unauthorized));
    }
}

#[tokio::test]
async fn test_orphaned_course_only_reachable_by_moderator() {
    let store = InMemoryStore::new();
    let member = store.add_user("member@example.com").await;
    let moderator = store.add_user("moderator@example.com").await;
    store.add_moderator(moderator).await;

    let member = Actor::resolve(&store, member).await.unwrap();
    let moderator = Actor::resolve(&store, moderator).await.unwrap();

    assert_eq!(authorize(&member, Action::Retrieve, None), Err(AccessError::Forbidden));
    authorize(&moderator, Action::Retrieve, None).unwrap();
    assert_eq!(authorize(&moderator, Action::Delete, None), Err(AccessError::Forbidden));
}
