//! In-memory store
//!
//! Implements every storage port over a single mutex-guarded state, so each
//! trait call is atomic the same way the Postgres statements are. Used by
//! unit tests across the workspace and by the worker's handler tests.
//!
//! ```
//! use lms_shared::store::memory::InMemoryStore;
//! use lms_shared::subscriptions::toggle_subscription;
//!
//! # async fn example() {
//! let store = InMemoryStore::new();
//! let user = store.add_user("student@example.com").await;
//! let course = store.add_course("Rust", None).await;
//!
//! let outcome = toggle_subscription(&store, user, course).await.unwrap();
//! assert!(outcome.is_subscribed);
//! # }
//! ```

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AccountFlags, Directory, JobSink, NotificationDirectory, PaymentLedger, StampOutcome,
    StoreError, StoreResult, SubscriptionStore, TargetDetails, ThrottleStore, UserMaintenance,
};
use crate::auth::actor::Role;
use crate::models::course::Course;
use crate::models::job::NewJob;
use crate::models::lesson::Lesson;
use crate::models::payment::{CreatePayment, Payment, ProviderSession};
use crate::models::user::User;
use crate::notifications::window_elapsed;
use crate::payments::PaymentTarget;

/// Job accepted by [`JobSink::enqueue`] or the throttle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedJob {
    pub id: Uuid,
    pub job: NewJob,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    moderators: HashSet<Uuid>,
    courses: HashMap<Uuid, Course>,
    lessons: HashMap<Uuid, Lesson>,
    /// (user_id, course_id) in subscription order
    subscriptions: Vec<(Uuid, Uuid)>,
    payments: HashMap<Uuid, Payment>,
    jobs: Vec<QueuedJob>,
}

impl MemoryState {
    fn enqueue(&mut self, job: NewJob) -> Option<Uuid> {
        if let Some(key) = &job.dedupe_key {
            if self.jobs.iter().any(|q| q.job.dedupe_key.as_ref() == Some(key)) {
                return None;
            }
        }

        let id = Uuid::new_v4();
        self.jobs.push(QueuedJob { id, job });
        Some(id)
    }
}

/// Mutex-backed implementation of the storage ports
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an active regular user and returns its ID
    pub async fn add_user(&self, email: &str) -> Uuid {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            city: None,
            avatar: None,
            is_active: true,
            is_staff: false,
            is_superuser: false,
            last_login: None,
            date_joined: now,
            updated_at: now,
        };
        let id = user.id;
        self.state.lock().await.users.insert(id, user);
        id
    }

    pub async fn add_moderator(&self, user_id: Uuid) {
        self.state.lock().await.moderators.insert(user_id);
    }

    pub async fn set_active(&self, user_id: Uuid, active: bool) {
        if let Some(user) = self.state.lock().await.users.get_mut(&user_id) {
            user.is_active = active;
        }
    }

    pub async fn set_staff(&self, user_id: Uuid, staff: bool) {
        if let Some(user) = self.state.lock().await.users.get_mut(&user_id) {
            user.is_staff = staff;
        }
    }

    pub async fn set_superuser(&self, user_id: Uuid, superuser: bool) {
        if let Some(user) = self.state.lock().await.users.get_mut(&user_id) {
            user.is_superuser = superuser;
        }
    }

    pub async fn set_last_login(&self, user_id: Uuid, at: Option<DateTime<Utc>>) {
        if let Some(user) = self.state.lock().await.users.get_mut(&user_id) {
            user.last_login = at;
        }
    }

    pub async fn user(&self, user_id: Uuid) -> Option<User> {
        self.state.lock().await.users.get(&user_id).cloned()
    }

    /// Adds a course and returns its ID
    pub async fn add_course(&self, title: &str, owner_id: Option<Uuid>) -> Uuid {
        let now = Utc::now();
        let course = Course {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            preview: None,
            owner_id,
            last_notification_sent_at: None,
            created_at: now,
            updated_at: now,
        };
        let id = course.id;
        self.state.lock().await.courses.insert(id, course);
        id
    }

    pub async fn course(&self, course_id: Uuid) -> Option<Course> {
        self.state.lock().await.courses.get(&course_id).cloned()
    }

    /// Removes a course together with its lessons and subscriptions
    pub async fn remove_course(&self, course_id: Uuid) {
        let mut state = self.state.lock().await;
        state.courses.remove(&course_id);
        state.lessons.retain(|_, lesson| lesson.course_id != course_id);
        state.subscriptions.retain(|(_, course)| *course != course_id);
    }

    /// Adds a lesson to an existing course and returns its ID
    pub async fn add_lesson(&self, course_id: Uuid, title: &str, owner_id: Option<Uuid>) -> Uuid {
        let now = Utc::now();
        let lesson = Lesson {
            id: Uuid::new_v4(),
            course_id,
            title: title.to_string(),
            description: String::new(),
            preview: None,
            video_url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
            owner_id,
            created_at: now,
            updated_at: now,
        };
        let id = lesson.id;
        self.state.lock().await.lessons.insert(id, lesson);
        id
    }

    /// Adds a lesson inside a fresh course of the same title
    pub async fn add_lesson_with_course(&self, title: &str, owner_id: Option<Uuid>) -> Uuid {
        let course_id = self.add_course(title, owner_id).await;
        self.add_lesson(course_id, title, owner_id).await
    }

    pub async fn subscribe(&self, user_id: Uuid, course_id: Uuid) {
        let mut state = self.state.lock().await;
        if !state.subscriptions.contains(&(user_id, course_id)) {
            state.subscriptions.push((user_id, course_id));
        }
    }

    pub async fn subscription_count(&self, course_id: Uuid) -> usize {
        self.state
            .lock()
            .await
            .subscriptions
            .iter()
            .filter(|(_, course)| *course == course_id)
            .count()
    }

    /// Jobs in enqueue order
    pub async fn jobs(&self) -> Vec<QueuedJob> {
        self.state.lock().await.jobs.clone()
    }

    pub async fn payment(&self, payment_id: Uuid) -> Option<Payment> {
        self.state.lock().await.payments.get(&payment_id).cloned()
    }

    pub async fn payment_count(&self) -> usize {
        self.state.lock().await.payments.len()
    }
}

#[async_trait]
impl Directory for InMemoryStore {
    async fn active_account(&self, user_id: Uuid) -> StoreResult<Option<AccountFlags>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .get(&user_id)
            .filter(|user| user.is_active)
            .map(|user| AccountFlags {
                is_staff: user.is_staff,
                is_superuser: user.is_superuser,
            }))
    }

    async fn role_of(&self, user_id: Uuid) -> StoreResult<Role> {
        let state = self.state.lock().await;
        Ok(if state.moderators.contains(&user_id) {
            Role::Moderator
        } else {
            Role::Member
        })
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn course_exists(&self, course_id: Uuid) -> StoreResult<bool> {
        Ok(self.state.lock().await.courses.contains_key(&course_id))
    }

    async fn remove_subscription(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.subscriptions.len();
        state.subscriptions.retain(|pair| *pair != (user_id, course_id));
        Ok(state.subscriptions.len() < before)
    }

    async fn insert_subscription_if_absent(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        if !state.courses.contains_key(&course_id) || !state.users.contains_key(&user_id) {
            return Err(StoreError::MissingReference);
        }
        if state.subscriptions.contains(&(user_id, course_id)) {
            return Ok(false);
        }
        state.subscriptions.push((user_id, course_id));
        Ok(true)
    }
}

#[async_trait]
impl JobSink for InMemoryStore {
    async fn enqueue(&self, job: NewJob) -> StoreResult<Option<Uuid>> {
        Ok(self.state.lock().await.enqueue(job))
    }
}

#[async_trait]
impl ThrottleStore for InMemoryStore {
    async fn stamp_and_enqueue_if_elapsed(
        &self,
        course_id: Uuid,
        now: DateTime<Utc>,
        window: Duration,
        job: NewJob,
    ) -> StoreResult<StampOutcome> {
        let mut state = self.state.lock().await;

        let Some(course) = state.courses.get_mut(&course_id) else {
            return Ok(StampOutcome::CourseMissing);
        };

        let last_sent = course.last_notification_sent_at;
        if !window_elapsed(last_sent, now, window) {
            if let Some(last_sent_at) = last_sent {
                return Ok(StampOutcome::WithinWindow { last_sent_at });
            }
        }

        if last_sent.map_or(true, |last| last <= now) {
            course.last_notification_sent_at = Some(now);
        }

        match state.enqueue(job) {
            Some(job_id) => Ok(StampOutcome::Stamped { job_id }),
            None => {
                // Undo the stamp, as the Postgres transaction would roll back
                if let Some(course) = state.courses.get_mut(&course_id) {
                    course.last_notification_sent_at = last_sent;
                }
                Err(StoreError::DuplicateJob)
            }
        }
    }
}

#[async_trait]
impl PaymentLedger for InMemoryStore {
    async fn resolve_target(&self, target: PaymentTarget) -> StoreResult<Option<TargetDetails>> {
        let state = self.state.lock().await;
        Ok(match target {
            PaymentTarget::Course(id) => state.courses.get(&id).map(|course| TargetDetails {
                title: course.title.clone(),
                description: course.description.clone(),
            }),
            PaymentTarget::Lesson(id) => state.lessons.get(&id).map(|lesson| TargetDetails {
                title: lesson.title.clone(),
                description: lesson.description.clone(),
            }),
        })
    }

    async fn insert_pending_payment(&self, data: CreatePayment) -> StoreResult<Payment> {
        let mut state = self.state.lock().await;

        let course_missing = data
            .paid_course_id
            .is_some_and(|id| !state.courses.contains_key(&id));
        let lesson_missing = data
            .paid_lesson_id
            .is_some_and(|id| !state.lessons.contains_key(&id));
        if !state.users.contains_key(&data.user_id) || course_missing || lesson_missing {
            return Err(StoreError::MissingReference);
        }

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            payment_date: now,
            paid_course_id: data.paid_course_id,
            paid_lesson_id: data.paid_lesson_id,
            amount: data.amount,
            payment_method: data.payment_method,
            stripe_product_id: None,
            stripe_price_id: None,
            stripe_session_id: None,
            payment_url: None,
            created_at: now,
            updated_at: now,
        };
        state.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn attach_provider_session(
        &self,
        payment_id: Uuid,
        session: &ProviderSession,
    ) -> StoreResult<Option<Payment>> {
        let mut state = self.state.lock().await;
        Ok(state.payments.get_mut(&payment_id).map(|payment| {
            payment.stripe_product_id = Some(session.product_id.clone());
            payment.stripe_price_id = Some(session.price_id.clone());
            payment.stripe_session_id = Some(session.session_id.clone());
            payment.payment_url = Some(session.url.clone());
            payment.updated_at = Utc::now();
            payment.clone()
        }))
    }
}

#[async_trait]
impl NotificationDirectory for InMemoryStore {
    async fn course_title(&self, course_id: Uuid) -> StoreResult<Option<String>> {
        let state = self.state.lock().await;
        Ok(state.courses.get(&course_id).map(|course| course.title.clone()))
    }

    async fn subscriber_emails(&self, course_id: Uuid) -> StoreResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|(_, course)| *course == course_id)
            .filter_map(|(user_id, _)| state.users.get(user_id))
            .filter(|user| user.is_active)
            .map(|user| user.email.clone())
            .collect())
    }
}

#[async_trait]
impl UserMaintenance for InMemoryStore {
    async fn deactivate_inactive_users(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut count = 0;

        for user in state.users.values_mut() {
            let stale = user.last_login.is_some_and(|last| last < cutoff);
            if user.is_active && !user.is_staff && !user.is_superuser && stale {
                user.is_active = false;
                user.updated_at = now;
                count += 1;
            }
        }

        Ok(count)
    }
}
