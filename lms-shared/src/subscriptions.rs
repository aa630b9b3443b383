/// Course subscription toggle
///
/// Subscribing is a single flip: if the (user, course) pair exists it is
/// removed, otherwise it is created. Calling the toggle twice returns to the
/// original state.
///
/// The unique constraint on the pair is the authority under concurrency. The
/// toggle first tries to delete; if nothing was deleted it inserts with
/// "do nothing on conflict". A concurrent toggle that inserted first makes
/// our insert a no-op, and the result converges to "subscribed".
///
/// # Example
///
/// ```
/// use lms_shared::subscriptions::toggle_subscription;
/// use lms_shared::store::memory::InMemoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryStore::new();
/// let user = store.add_user("student@example.com").await;
/// let course = store.add_course("Rust", None).await;
///
/// assert!(toggle_subscription(&store, user, course).await?.is_subscribed);
/// assert!(!toggle_subscription(&store, user, course).await?.is_subscribed);
/// # Ok(())
/// # }
/// ```

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{StoreError, SubscriptionStore};

/// Error type for the subscription toggle
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Course not found")]
    CourseNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// State after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub is_subscribed: bool,
}

impl ToggleOutcome {
    /// Message returned to API clients
    pub fn message(&self) -> &'static str {
        if self.is_subscribed {
            "subscription added"
        } else {
            "subscription removed"
        }
    }
}

/// Flips the subscription of `user_id` to `course_id`
///
/// # Errors
///
/// - [`SubscriptionError::CourseNotFound`] if the course does not exist
///   (including when it is deleted mid-toggle)
pub async fn toggle_subscription<S>(
    store: &S,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<ToggleOutcome, SubscriptionError>
where
    S: SubscriptionStore + ?Sized,
{
    if !store.course_exists(course_id).await? {
        return Err(SubscriptionError::CourseNotFound);
    }

    if store.remove_subscription(user_id, course_id).await? {
        info!(user_id = %user_id, course_id = %course_id, "Subscription removed");
        return Ok(ToggleOutcome { is_subscribed: false });
    }

    match store.insert_subscription_if_absent(user_id, course_id).await {
        Ok(true) => {
            info!(user_id = %user_id, course_id = %course_id, "Subscription added");
        }
        Ok(false) => {
            debug!(
                user_id = %user_id,
                course_id = %course_id,
                "Concurrent toggle inserted first; converging to subscribed"
            );
        }
        Err(StoreError::MissingReference) => return Err(SubscriptionError::CourseNotFound),
        Err(e) => return Err(e.into()),
    }

    Ok(ToggleOutcome { is_subscribed: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_toggle_twice_returns_to_original_state() {
        let store = InMemoryStore::new();
        let user = store.add_user("b@example.com").await;
        let course = store.add_course("Course", None).await;

        let first = toggle_subscription(&store, user, course).await.unwrap();
        let second = toggle_subscription(&store, user, course).await.unwrap();

        assert!(first.is_subscribed);
        assert_eq!(first.message(), "subscription added");
        assert_eq!(second.is_subscribed, !first.is_subscribed);
        assert_eq!(second.message(), "subscription removed");
        assert_eq!(store.subscription_count(course).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_course_is_not_found() {
        let store = InMemoryStore::new();
        let user = store.add_user("b@example.com").await;

        let result = toggle_subscription(&store, user, Uuid::new_v4()).await;
        assert!(matches!(result, Err(SubscriptionError::CourseNotFound)));
    }

    #[tokio::test]
    async fn test_subscriptions_are_per_user() {
        let store = InMemoryStore::new();
        let alice = store.add_user("alice@example.com").await;
        let bob = store.add_user("bob@example.com").await;
        let course = store.add_course("Course", None).await;

        assert!(toggle_subscription(&store, alice, course).await.unwrap().is_subscribed);
        assert!(toggle_subscription(&store, bob, course).await.unwrap().is_subscribed);
        assert_eq!(store.subscription_count(course).await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_toggles_never_duplicate() {
        let store = Arc::new(InMemoryStore::new());
        let user = store.add_user("racer@example.com").await;
        let course = store.add_course("Course", None).await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { toggle_subscription(store.as_ref(), user, course).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(store.subscription_count(course).await <= 1);
    }
}
