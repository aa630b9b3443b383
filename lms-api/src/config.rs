/// Configuration management for the API server
///
/// Loaded once from environment variables (and `.env` in development).
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8000)
/// - `API_PRODUCTION`: restrict CORS to `CORS_ORIGINS` (default: false)
/// - `CORS_ORIGINS`: comma separated origins, `*` for any (default: `*`)
/// - `JWT_SECRET`: token signing secret, at least 32 characters (required)
/// - `ACCESS_TOKEN_TTL_MINUTES` (default: 60), `REFRESH_TOKEN_TTL_DAYS` (default: 1)
/// - `STRIPE_SECRET_KEY`: enables payments when set
/// - `STRIPE_API_BASE`, `STRIPE_SUCCESS_URL`, `STRIPE_CANCEL_URL`
/// - `PAYMENT_CURRENCY` (default: rub)
/// - `PAGE_SIZE`: default list page size (default: 10)
///
/// # Example
///
/// ```no_run
/// use lms_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use secrecy::SecretString;
use std::env;
use std::str::FromStr;

use lms_shared::payments::orchestrator::DEFAULT_CURRENCY;
use lms_shared::payments::stripe::DEFAULT_API_BASE;

/// Largest page size a client may request
pub const MAX_PAGE_SIZE: u32 = 100;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub payments: PaymentsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Production mode restricts CORS to `cors_origins`
    pub production: bool,

    pub cors_origins: Vec<String>,

    /// Default page size for list endpoints
    pub page_size: u32,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Token configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Signing secret
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: SecretString,

    pub access_ttl_minutes: i64,

    pub refresh_ttl_days: i64,
}

/// Payment provider configuration
#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    /// None disables payment creation (503)
    pub stripe_secret_key: Option<SecretString>,
    pub stripe_api_base: String,
    pub success_url: String,
    pub cancel_url: String,
    pub currency: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            production: false,
            cors_origins: vec!["*".to_string()],
            page_size: 10,
        }
    }
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            stripe_secret_key: None,
            stripe_api_base: DEFAULT_API_BASE.to_string(),
            success_url: "http://127.0.0.1:8000/api/payments/success/".to_string(),
            cancel_url: "http://127.0.0.1:8000/api/payments/cancel/".to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
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

/// Splits `CORS_ORIGINS`
pub fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a value does not
    /// parse, or the JWT secret is shorter than 32 characters.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = ApiConfig::default();
        let api = ApiConfig {
            host: optional_var("API_HOST").unwrap_or(defaults.host),
            port: var_or("API_PORT", defaults.port)?,
            production: var_or("API_PRODUCTION", defaults.production)?,
            cors_origins: optional_var("CORS_ORIGINS")
                .map(|value| parse_origins(&value))
                .unwrap_or(defaults.cors_origins),
            page_size: var_or("PAGE_SIZE", defaults.page_size)?,
        };

        if api.page_size == 0 || api.page_size > MAX_PAGE_SIZE {
            anyhow::bail!("PAGE_SIZE must be between 1 and {}", MAX_PAGE_SIZE);
        }

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            max_connections: var_or("DATABASE_MAX_CONNECTIONS", 10)?,
        };

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let jwt = JwtConfig {
            secret: SecretString::new(jwt_secret),
            access_ttl_minutes: var_or("ACCESS_TOKEN_TTL_MINUTES", 60)?,
            refresh_ttl_days: var_or("REFRESH_TOKEN_TTL_DAYS", 1)?,
        };

        let payment_defaults = PaymentsConfig::default();
        let payments = PaymentsConfig {
            stripe_secret_key: optional_var("STRIPE_SECRET_KEY").map(SecretString::new),
            stripe_api_base: optional_var("STRIPE_API_BASE").unwrap_or(payment_defaults.stripe_api_base),
            success_url: optional_var("STRIPE_SUCCESS_URL").unwrap_or(payment_defaults.success_url),
            cancel_url: optional_var("STRIPE_CANCEL_URL").unwrap_or(payment_defaults.cancel_url),
            currency: optional_var("PAYMENT_CURRENCY")
                .map(|c| c.to_ascii_lowercase())
                .unwrap_or(payment_defaults.currency),
        };

        Ok(Self {
            api,
            database,
            jwt,
            payments,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                ..Default::default()
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/lms".to_string(),
                max_connections: 10,
            },
            jwt: JwtConfig {
                secret: SecretString::new("test-secret-key-at-least-32-bytes-long".to_string()),
                access_ttl_minutes: 60,
                refresh_ttl_days: 1,
            },
            payments: PaymentsConfig::default(),
        };

        assert_eq!(config.bind_address(), "127.0.0.1:8000");
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://a.example.com, https://b.example.com,"),
            vec!["https://a.example.com", "https://b.example.com"]
        );
        assert_eq!(parse_origins("*"), vec!["*"]);
    }

    #[test]
    fn test_payment_defaults() {
        let payments = PaymentsConfig::default();
        assert!(payments.stripe_secret_key.is_none());
        assert_eq!(payments.currency, "rub");
        assert_eq!(payments.stripe_api_base, "https://api.stripe.com");
    }
}
