/// JWT token generation and validation module
///
/// Tokens are signed with HS256 and carry the user ID as subject. Two kinds
/// are issued as a pair on login: a short-lived access token used as a
/// Bearer credential, and a longer-lived refresh token that can only be
/// exchanged for a new access token.
///
/// # Lifetimes
///
/// - **Access Token**: 60 minutes by default
/// - **Refresh Token**: 1 day by default
///
/// Both are configurable through [`TokenIssuer::new`].
///
/// # Example
///
/// ```
/// use lms_shared::auth::jwt::{TokenIssuer, TokenType};
/// use chrono::Duration;
/// use secrecy::SecretString;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let issuer = TokenIssuer::new(
///     SecretString::new("a-secret-of-at-least-thirty-two-bytes".to_string()),
///     Duration::minutes(60),
///     Duration::days(1),
/// );
///
/// let user_id = Uuid::new_v4();
/// let pair = issuer.issue_pair(user_id)?;
///
/// let claims = issuer.validate_access(&pair.access)?;
/// assert_eq!(claims.sub, user_id);
/// assert_eq!(claims.token_type, TokenType::Access);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value of the `iss` claim
pub const ISSUER: &str = "lms";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token was issued by someone else
    #[error("Invalid issuer")]
    InvalidIssuer,

    /// Token is valid but of the wrong kind
    #[error("Expected {expected} token, got {actual} token")]
    WrongTokenType {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Bearer credential for API calls
    Access,

    /// Exchangeable for a new access token
    Refresh,
}

impl TokenType {
    /// Gets token type as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - User ID
    pub sub: Uuid,

    /// Issuer - Always [`ISSUER`]
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Token type (custom claim)
    pub token_type: TokenType,
}

impl Claims {
    /// Creates claims valid from now for `expires_in`
    pub fn with_expiration(user_id: Uuid, token_type: TokenType, expires_in: Duration) -> Self {
        let now = Utc::now();
        let expiration = now + expires_in;

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            nbf: now.timestamp(),
            token_type,
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates signature, expiry, not-before and issuer, then returns the claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

fn expect_type(claims: Claims, expected: TokenType) -> Result<Claims, JwtError> {
    if claims.token_type != expected {
        return Err(JwtError::WrongTokenType {
            expected: expected.as_str(),
            actual: claims.token_type.as_str(),
        });
    }
    Ok(claims)
}

/// Access and refresh token returned on login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues and validates tokens with one signing secret and fixed lifetimes
///
/// Constructed once at startup and shared through application state.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: SecretString,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: SecretString, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            secret,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Creates a single token of the given type
    pub fn issue(&self, user_id: Uuid, token_type: TokenType) -> Result<String, JwtError> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let claims = Claims::with_expiration(user_id, token_type, ttl);
        create_token(&claims, self.secret.expose_secret())
    }

    /// Creates an access/refresh pair for a successful login
    pub fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access: self.issue(user_id, TokenType::Access)?,
            refresh: self.issue(user_id, TokenType::Refresh)?,
        })
    }

    /// Validates a Bearer credential
    pub fn validate_access(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = validate_token(token, self.secret.expose_secret())?;
        expect_type(claims, TokenType::Access)
    }

    /// Validates a refresh token
    pub fn validate_refresh(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = validate_token(token, self.secret.expose_secret())?;
        expect_type(claims, TokenType::Refresh)
    }

    /// Exchanges a valid refresh token for a new access token
    ///
    /// Returns the subject so the caller can re-check that the user is still
    /// active before handing out the token.
    pub fn refresh(&self, refresh_token: &str) -> Result<(Uuid, String), JwtError> {
        let claims = self.validate_refresh(refresh_token)?;
        let access = self.issue(claims.sub, TokenType::Access)?;
        Ok((claims.sub, access))
    }
}
