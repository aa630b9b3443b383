//! Storage ports used by the core components
//!
//! The access policy, subscription toggle, notification throttle, payment
//! orchestrator and job handlers only talk to storage through these traits.
//! Two implementations exist:
//!
//! - [`postgres::PgStore`]: production, backed by the sqlx models
//! - [`memory::InMemoryStore`]: tests and local experiments
//!
//! Every trait is object safe and `Send + Sync` so it can sit behind an
//! `Arc<dyn ...>` in application state.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::auth::actor::Role;
use crate::models::job::NewJob;
use crate::models::payment::{CreatePayment, Payment, ProviderSession};
use crate::payments::PaymentTarget;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A referenced row (user, course, lesson) does not exist
    #[error("Referenced record does not exist")]
    MissingReference,

    /// A job with the same dedupe key is already queued
    #[error("Duplicate job")]
    DuplicateJob,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Maps foreign key violations to [`StoreError::MissingReference`]
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_foreign_key_violation() {
                return StoreError::MissingReference;
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Account flags needed to build a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountFlags {
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Users and their roles
#[async_trait]
pub trait Directory: Send + Sync {
    /// Flags of an active user; None if the user is missing or inactive
    async fn active_account(&self, user_id: Uuid) -> StoreResult<Option<AccountFlags>>;

    /// Role of a user, derived from group membership
    async fn role_of(&self, user_id: Uuid) -> StoreResult<Role>;
}

/// Subscription set primitives
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn course_exists(&self, course_id: Uuid) -> StoreResult<bool>;

    /// Deletes the pair; true if a row was removed
    async fn remove_subscription(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<bool>;

    /// Inserts the pair unless present; true if this call created it
    ///
    /// Fails with [`StoreError::MissingReference`] if the course is gone.
    async fn insert_subscription_if_absent(&self, user_id: Uuid, course_id: Uuid)
        -> StoreResult<bool>;
}

/// Result of the atomic throttle check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StampOutcome {
    /// Course does not exist
    CourseMissing,

    /// Stamp moved to `now` and the job was enqueued
    Stamped { job_id: Uuid },

    /// Window still open; nothing written
    WithinWindow { last_sent_at: DateTime<Utc> },
}

/// Job hand-off to the worker
#[async_trait]
pub trait JobSink: Send + Sync {
    /// Enqueues a job; None if a job with the same dedupe key exists
    async fn enqueue(&self, job: NewJob) -> StoreResult<Option<Uuid>>;
}

/// Throttled notification hand-off
#[async_trait]
pub trait ThrottleStore: Send + Sync {
    /// Atomically: read the course's `last_notification_sent_at`; if it is
    /// NULL or at least `window` before `now`, stamp it with `now` and
    /// enqueue `job`. Concurrent callers for the same course are serialised.
    async fn stamp_and_enqueue_if_elapsed(
        &self,
        course_id: Uuid,
        now: DateTime<Utc>,
        window: Duration,
        job: NewJob,
    ) -> StoreResult<StampOutcome>;
}

/// Title and description of a payable course or lesson
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDetails {
    pub title: String,
    pub description: String,
}

/// Payment persistence used by the payment orchestrator
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Looks up the paid course or lesson; None if it does not exist
    async fn resolve_target(&self, target: PaymentTarget) -> StoreResult<Option<TargetDetails>>;

    async fn insert_pending_payment(&self, data: CreatePayment) -> StoreResult<Payment>;

    /// Writes provider identifiers; None if the payment vanished meanwhile
    async fn attach_provider_session(
        &self,
        payment_id: Uuid,
        session: &ProviderSession,
    ) -> StoreResult<Option<Payment>>;
}

/// Reads needed by the course notification job
#[async_trait]
pub trait NotificationDirectory: Send + Sync {
    async fn course_title(&self, course_id: Uuid) -> StoreResult<Option<String>>;

    /// Emails of the active subscribers of a course
    async fn subscriber_emails(&self, course_id: Uuid) -> StoreResult<Vec<String>>;
}

/// Account maintenance used by the deactivation job
#[async_trait]
pub trait UserMaintenance: Send + Sync {
    /// Deactivates regular users with `last_login < cutoff`; returns the count
    async fn deactivate_inactive_users(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}
