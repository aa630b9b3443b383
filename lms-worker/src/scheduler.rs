/// Daily deactivation scheduler
///
/// Once a day at `DEACTIVATION_HOUR_UTC` (default 00:00 UTC, 03:00 Moscow
/// time) a `deactivate_inactive_users` job is enqueued. The job carries the
/// dedupe key `deactivate_inactive_users:<date>`, so any number of workers
/// may run the scheduler and the job is still enqueued once per day.
///
/// On startup a run whose slot already passed today is enqueued as well;
/// a worker that was down at the slot time catches up, and one that was
/// not hits the dedupe key.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use lms_shared::models::job::{JobPayload, NewJob};
use lms_shared::store::{JobSink, StoreError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Prefix of the per-day dedupe key
pub const DEDUPE_PREFIX: &str = "deactivate_inactive_users";

pub fn dedupe_key(date: NaiveDate) -> String {
    format!("{}:{}", DEDUPE_PREFIX, date.format("%Y-%m-%d"))
}

/// Slot time on `date`
pub fn slot_on(date: NaiveDate, hour_utc: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour_utc, 0, 0).unwrap_or(NaiveTime::MIN);
    date.and_time(time).and_utc()
}

/// First slot strictly after `now`
pub fn next_slot_after(now: DateTime<Utc>, hour_utc: u32) -> DateTime<Utc> {
    let today = now.date_naive();
    let slot = slot_on(today, hour_utc);

    if slot > now {
        slot
    } else {
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
        slot_on(tomorrow, hour_utc)
    }
}

/// Enqueues the daily deactivation job
pub struct DeactivationScheduler {
    sink: Arc<dyn JobSink>,
    hour_utc: u32,
    days: i64,
    max_attempts: i32,
}

impl DeactivationScheduler {
    pub fn new(sink: Arc<dyn JobSink>, hour_utc: u32, days: i64, max_attempts: i32) -> Self {
        Self {
            sink,
            hour_utc,
            days,
            max_attempts,
        }
    }

    /// Job for the slot on `date`
    pub fn job_for(&self, date: NaiveDate) -> NewJob {
        let mut job = NewJob::now(JobPayload::DeactivateInactiveUsers { days: self.days })
            .run_at(slot_on(date, self.hour_utc))
            .with_dedupe_key(dedupe_key(date));
        job.max_attempts = self.max_attempts;
        job
    }

    /// Enqueues the run for `date`; None if it was already enqueued
    pub async fn enqueue_for(&self, date: NaiveDate) -> Result<Option<Uuid>, StoreError> {
        let job_id = self.sink.enqueue(self.job_for(date)).await?;

        match job_id {
            Some(id) => tracing::info!(job_id = %id, date = %date, "Deactivation job enqueued"),
            None => tracing::debug!(date = %date, "Deactivation job already enqueued"),
        }

        Ok(job_id)
    }

    /// Enqueues today's run if its slot has passed
    pub async fn catch_up(&self, now: DateTime<Utc>) -> Result<Option<Uuid>, StoreError> {
        let today = now.date_naive();
        if slot_on(today, self.hour_utc) <= now {
            self.enqueue_for(today).await
        } else {
            Ok(None)
        }
    }

    /// Runs until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(hour_utc = self.hour_utc, days = self.days, "Deactivation scheduler starting");

        if let Err(e) = self.catch_up(Utc::now()).await {
            tracing::error!(error = %e, "Failed to enqueue missed deactivation run");
        }

        loop {
            let now = Utc::now();
            let next = next_slot_after(now, self.hour_utc);
            let wait = (next - now).to_std().unwrap_or_default();

            tracing::debug!(next_run = %next, "Deactivation scheduler sleeping");

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            if let Err(e) = self.enqueue_for(next.date_naive()).await {
                tracing::error!(error = %e, "Failed to enqueue deactivation job");
            }
        }

        tracing::info!("Deactivation scheduler stopped");
    }
}
