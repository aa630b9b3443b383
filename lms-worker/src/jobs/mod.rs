//! Job handlers
//!
//! One module per [`JobPayload`](lms_shared::models::job::JobPayload)
//! variant. Handlers only see storage through the `lms_shared::store`
//! traits and mail through [`Mailer`](crate::mailer::Mailer), so they run
//! unchanged against the in-memory store in tests.

pub mod deactivate_inactive_users;
pub mod notify_course_updated;

use lms_shared::store::StoreError;
use thiserror::Error;

use crate::mailer::MailError;

/// Job execution error
#[derive(Debug, Error)]
pub enum JobError {
    /// Stored payload does not decode or is out of range
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    /// Handler ran past the execution limit
    #[error("Job timed out after {0} seconds")]
    TimedOut(u64),
}

impl JobError {
    /// False for failures that another attempt cannot fix
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            JobError::InvalidPayload(_) | JobError::Mail(MailError::InvalidMessage(_))
        )
    }
}
