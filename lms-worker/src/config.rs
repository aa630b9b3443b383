/// Worker configuration
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 5)
/// - `WORKER_POLL_INTERVAL_SECS`: sleep between empty polls (default: 1)
/// - `WORKER_BATCH_SIZE`: jobs claimed per poll (default: 10)
/// - `WORKER_MAX_ATTEMPTS`: attempts for scheduled jobs (default: 5)
/// - `MAIL_BACKEND`: `log` or `resend` (default: log)
/// - `RESEND_API_KEY`: required when `MAIL_BACKEND=resend`
/// - `DEFAULT_FROM_EMAIL`: sender address (default: no-reply@example.com)
/// - `INACTIVE_USER_DAYS`: deactivation threshold (default: 30)
/// - `DEACTIVATION_HOUR_UTC`: hour of the daily deactivation run (default: 0)

use secrecy::SecretString;
use std::env;
use std::str::FromStr;

use lms_shared::models::job::DEFAULT_MAX_ATTEMPTS;

/// Mail transport selection
#[derive(Debug, Clone)]
pub enum MailBackend {
    /// Write messages to the log
    Log,

    /// Resend HTTP API
    Resend { api_key: SecretString },
}

/// Complete worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub poll_interval_secs: u64,
    pub batch_size: usize,
    pub max_attempts: i32,
    pub mail: MailBackend,
    pub from_email: String,
    pub inactive_user_days: i64,
    pub deactivation_hour_utc: u32,
}

fn var_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", name, e)),
        _ => Ok(default),
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Parses `MAIL_BACKEND` together with the key it needs
pub fn parse_mail_backend(backend: Option<&str>, api_key: Option<String>) -> anyhow::Result<MailBackend> {
    match backend.map(|b| b.trim().to_ascii_lowercase()).as_deref() {
        None | Some("log") => Ok(MailBackend::Log),
        Some("resend") => {
            let key = api_key
                .ok_or_else(|| anyhow::anyhow!("RESEND_API_KEY is required when MAIL_BACKEND=resend"))?;
            Ok(MailBackend::Resend {
                api_key: SecretString::new(key),
            })
        }
        Some(other) => anyhow::bail!("Unknown MAIL_BACKEND: {}", other),
    }
}

impl WorkerConfig {
    /// Loads configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let mail = parse_mail_backend(
            optional_var("MAIL_BACKEND").as_deref(),
            optional_var("RESEND_API_KEY"),
        )?;

        let config = Self {
            database_url,
            database_max_connections: var_or("DATABASE_MAX_CONNECTIONS", 5)?,
            poll_interval_secs: var_or("WORKER_POLL_INTERVAL_SECS", 1)?,
            batch_size: var_or("WORKER_BATCH_SIZE", 10)?,
            max_attempts: var_or("WORKER_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            mail,
            from_email: optional_var("DEFAULT_FROM_EMAIL")
                .unwrap_or_else(|| "no-reply@example.com".to_string()),
            inactive_user_days: var_or("INACTIVE_USER_DAYS", 30)?,
            deactivation_hour_utc: var_or("DEACTIVATION_HOUR_UTC", 0)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("WORKER_BATCH_SIZE must be at least 1");
        }
        if self.max_attempts < 1 {
            anyhow::bail!("WORKER_MAX_ATTEMPTS must be at least 1");
        }
        if self.inactive_user_days < 1 {
            anyhow::bail!("INACTIVE_USER_DAYS must be at least 1");
        }
        if self.deactivation_hour_utc > 23 {
            anyhow::bail!("DEACTIVATION_HOUR_UTC must be between 0 and 23");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WorkerConfig {
        WorkerConfig {
            database_url: "postgresql://localhost/lms".to_string(),
            database_max_connections: 5,
            poll_interval_secs: 1,
            batch_size: 10,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            mail: MailBackend::Log,
            from_email: "no-reply@example.com".to_string(),
            inactive_user_days: 30,
            deactivation_hour_utc: 0,
        }
    }

    #[test]
    fn test_mail_backend_parsing() {
        assert!(matches!(parse_mail_backend(None, None).unwrap(), MailBackend::Log));
        assert!(matches!(parse_mail_backend(Some("LOG"), None).unwrap(), MailBackend::Log));
        assert!(matches!(
            parse_mail_backend(Some("resend"), Some("re_123".to_string())).unwrap(),
            MailBackend::Resend { .. }
        ));
        assert!(parse_mail_backend(Some("resend"), None).is_err());
        assert!(parse_mail_backend(Some("smtp"), None).is_err());
    }

    #[test]
    fn test_validate_bounds() {
        assert!(config().validate().is_ok());

        let mut bad = config();
        bad.deactivation_hour_utc = 24;
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.batch_size = 0;
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.inactive_user_days = 0;
        assert!(bad.validate().is_err());
    }
}
