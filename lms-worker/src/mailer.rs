/// Mail transports
///
/// Jobs build an [`OutgoingEmail`] and hand it to a [`Mailer`]. Three
/// implementations:
///
/// - [`LogMailer`]: writes the message to the log (default, development)
/// - [`ResendMailer`]: JSON over HTTPS to the Resend API
/// - [`RecordingMailer`]: keeps messages in memory for tests
///
/// # Example
///
/// ```
/// use lms_worker::mailer::{Mailer, OutgoingEmail, RecordingMailer};
///
/// # async fn example() {
/// let mailer = RecordingMailer::new();
/// let email = OutgoingEmail::bcc(
///     "no-reply@example.com",
///     vec!["student@example.com".to_string()],
///     "Hello",
///     "Body",
/// );
/// mailer.send(&email).await.unwrap();
/// assert_eq!(mailer.sent().len(), 1);
/// # }
/// ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;

/// Resend API endpoint
pub const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Mail error types
#[derive(Debug, Clone, Error)]
pub enum MailError {
    /// Message has no recipients or no sender
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Request never reached the transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// Transport refused the message
    #[error("Mail rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// A single message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    /// Message addressed to the sender with every recipient in Bcc
    pub fn bcc(
        from: impl Into<String>,
        recipients: Vec<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let from = from.into();
        Self {
            to: vec![from.clone()],
            from,
            bcc: recipients,
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Number of Bcc recipients
    pub fn recipient_count(&self) -> usize {
        self.bcc.len()
    }

    fn check(&self) -> Result<(), MailError> {
        if self.from.trim().is_empty() {
            return Err(MailError::InvalidMessage("missing sender".to_string()));
        }
        if self.to.is_empty() && self.bcc.is_empty() {
            return Err(MailError::InvalidMessage("no recipients".to_string()));
        }
        Ok(())
    }
}

/// Mail transport
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Transport name for logs
    fn name(&self) -> &str;

    /// Sends one message; all recipients are accepted on `Ok`
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// Writes messages to the log instead of sending them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        email.check()?;

        tracing::info!(
            from = %email.from,
            recipients = email.recipient_count(),
            subject = %email.subject,
            "Email (log backend)"
        );
        tracing::debug!(bcc = ?email.bcc, body = %email.body, "Email content");

        Ok(())
    }
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    bcc: &'a [String],
    subject: &'a str,
    text: &'a str,
}

/// Resend HTTP API transport
pub struct ResendMailer {
    api_key: SecretString,
    endpoint: String,
    http_client: reqwest::Client,
}

impl ResendMailer {
    pub fn new(api_key: SecretString) -> Result<Self, MailError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(Self {
            api_key,
            endpoint: RESEND_API_URL.to_string(),
            http_client,
        })
    }

    /// Overrides the API endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    fn name(&self) -> &str {
        "resend"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        email.check()?;

        let request = ResendRequest {
            from: &email.from,
            to: &email.to,
            bcc: &email.bcc,
            subject: &email.subject,
            text: &email.body,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Resend request failed");
                MailError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Resend rejected message");
            return Err(MailError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(recipients = email.recipient_count(), "Email accepted by Resend");
        Ok(())
    }
}

#[derive(Default)]
struct RecordingState {
    sent: Vec<OutgoingEmail>,
    failure: Option<MailError>,
}

/// In-memory transport for tests; clones share state
#[derive(Default, Clone)]
pub struct RecordingMailer {
    inner: Arc<Mutex<RecordingState>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RecordingState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes every future send fail with `error`
    pub fn fail_with(&self, error: MailError) {
        self.state().failure = Some(error);
    }

    /// Messages accepted so far
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.state().sent.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        email.check()?;

        let mut state = self.state();
        if let Some(error) = &state.failure {
            return Err(error.clone());
        }
        state.sent.push(email.clone());
        Ok(())
    }
}
