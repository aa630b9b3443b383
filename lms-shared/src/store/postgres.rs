//! Postgres implementation of the storage ports
//!
//! Delegates to the model functions. The notification throttle is the one
//! operation that needs more than a single statement: it locks the course
//! row, decides, stamps and enqueues inside one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{
    AccountFlags, Directory, JobSink, NotificationDirectory, PaymentLedger, StampOutcome,
    StoreError, StoreResult, SubscriptionStore, TargetDetails, ThrottleStore, UserMaintenance,
};
use crate::auth::actor::Role;
use crate::models::course::Course;
use crate::models::job::{Job, NewJob};
use crate::models::payment::{CreatePayment, Payment, ProviderSession};
use crate::models::subscription::Subscription;
use crate::models::user::{Group, User};
use crate::notifications::window_elapsed;
use crate::payments::PaymentTarget;

/// Storage ports backed by a connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Directory for PgStore {
    async fn active_account(&self, user_id: Uuid) -> StoreResult<Option<AccountFlags>> {
        let user = User::find_by_id(&self.pool, user_id).await?;

        Ok(user.filter(|u| u.is_active).map(|u| AccountFlags {
            is_staff: u.is_staff,
            is_superuser: u.is_superuser,
        }))
    }

    async fn role_of(&self, user_id: Uuid) -> StoreResult<Role> {
        let moderator = User::is_member_of(&self.pool, user_id, Group::Moderators).await?;
        Ok(if moderator { Role::Moderator } else { Role::Member })
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn course_exists(&self, course_id: Uuid) -> StoreResult<bool> {
        Ok(Course::exists(&self.pool, course_id).await?)
    }

    async fn remove_subscription(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<bool> {
        Ok(Subscription::remove(&self.pool, user_id, course_id).await?)
    }

    async fn insert_subscription_if_absent(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<bool> {
        Subscription::insert_if_absent(&self.pool, user_id, course_id)
            .await
            .map_err(StoreError::from_sqlx)
    }
}

#[async_trait]
impl JobSink for PgStore {
    async fn enqueue(&self, job: NewJob) -> StoreResult<Option<Uuid>> {
        Ok(Job::enqueue(&self.pool, &job).await?)
    }
}

#[async_trait]
impl ThrottleStore for PgStore {
    async fn stamp_and_enqueue_if_elapsed(
        &self,
        course_id: Uuid,
        now: DateTime<Utc>,
        window: Duration,
        job: NewJob,
    ) -> StoreResult<StampOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row lock serialises concurrent lesson edits of the same course
        let Some(last_sent) = Course::lock_notification_stamp(&mut *tx, course_id).await? else {
            return Ok(StampOutcome::CourseMissing);
        };

        if !window_elapsed(last_sent, now, window) {
            if let Some(last_sent_at) = last_sent {
                return Ok(StampOutcome::WithinWindow { last_sent_at });
            }
        }

        let stamped = Course::stamp_notification(&mut *tx, course_id, now).await?;
        if !stamped {
            debug!(course_id = %course_id, "Notification stamp already ahead of now; left as is");
        }

        let Some(job_id) = Job::enqueue(&mut *tx, &job).await? else {
            return Err(StoreError::DuplicateJob);
        };

        tx.commit().await?;

        Ok(StampOutcome::Stamped { job_id })
    }
}

#[async_trait]
impl PaymentLedger for PgStore {
    async fn resolve_target(&self, target: PaymentTarget) -> StoreResult<Option<TargetDetails>> {
        let query = match target {
            PaymentTarget::Course(_) => "SELECT title, description FROM courses WHERE id = $1",
            PaymentTarget::Lesson(_) => "SELECT title, description FROM lessons WHERE id = $1",
        };
        let id = target.course_id().or(target.lesson_id());

        let row: Option<(String, String)> = sqlx::query_as(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(title, description)| TargetDetails { title, description }))
    }

    async fn insert_pending_payment(&self, data: CreatePayment) -> StoreResult<Payment> {
        Payment::create(&self.pool, data)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn attach_provider_session(
        &self,
        payment_id: Uuid,
        session: &ProviderSession,
    ) -> StoreResult<Option<Payment>> {
        Ok(Payment::attach_session(&self.pool, payment_id, session).await?)
    }
}

#[async_trait]
impl NotificationDirectory for PgStore {
    async fn course_title(&self, course_id: Uuid) -> StoreResult<Option<String>> {
        Ok(Course::find_by_id(&self.pool, course_id)
            .await?
            .map(|course| course.title))
    }

    async fn subscriber_emails(&self, course_id: Uuid) -> StoreResult<Vec<String>> {
        Ok(Subscription::subscriber_emails(&self.pool, course_id).await?)
    }
}

#[async_trait]
impl UserMaintenance for PgStore {
    async fn deactivate_inactive_users(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        Ok(User::deactivate_inactive(&self.pool, cutoff).await?)
    }
}
