/// `deactivate_inactive_users` job
///
/// Deactivates regular accounts (neither staff nor superuser) whose last
/// login is older than `days`. Accounts that never logged in are left
/// alone. Returns the number of accounts deactivated.

use chrono::{DateTime, Duration, Utc};
use lms_shared::store::UserMaintenance;
use tracing::info;

use super::JobError;

/// Threshold used when the scheduler is not configured otherwise
pub const DEFAULT_INACTIVE_DAYS: i64 = 30;

/// Login cutoff for `days` of inactivity
pub fn cutoff(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, JobError> {
    if days < 1 {
        return Err(JobError::InvalidPayload(format!(
            "days must be at least 1, got {}",
            days
        )));
    }

    Duration::try_days(days)
        .and_then(|span| now.checked_sub_signed(span))
        .ok_or_else(|| JobError::InvalidPayload(format!("days out of range: {}", days)))
}

pub async fn run<U>(users: &U, days: i64, now: DateTime<Utc>) -> Result<u64, JobError>
where
    U: UserMaintenance + ?Sized,
{
    let cutoff = cutoff(now, days)?;
    let count = users.deactivate_inactive_users(cutoff).await?;

    info!(days, cutoff = %cutoff, count, "Inactive users deactivated");

    Ok(count)
}
