/// Password hashing and password rules
///
/// Passwords are hashed with Argon2id (64 MB memory, 3 passes, 4 lanes) and
/// stored in PHC string format, so parameters travel with the hash and can
/// be raised later without invalidating existing accounts.
///
/// # Example
///
/// ```
/// use lms_shared::auth::password::{hash_password, verify_password, validate_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// validate_password("correct horse battery")?;
///
/// let hash = hash_password("correct horse battery")?;
/// assert!(verify_password("correct horse battery", &hash)?);
/// assert!(!verify_password("wrong", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Minimum number of characters in a password
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Error type for password operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Stored hash is not a PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),

    /// Password does not satisfy the password rules
    #[error("{0}")]
    TooWeak(String),
}

/// Hashes a password using Argon2id
///
/// Output looks like `$argon2id$v=19$m=65536,t=3,p=4$<salt>$<hash>`.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(65536)
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a stored hash
///
/// # Returns
///
/// `Ok(true)` on match, `Ok(false)` on mismatch
///
/// # Errors
///
/// Returns an error if the stored hash cannot be parsed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    // Parameters are read from the hash itself
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Checks a new password against the password rules
///
/// - at least [`MIN_PASSWORD_LENGTH`] characters
/// - not made of digits only
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooWeak(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }

    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(PasswordError::TooWeak(
            "Password cannot be entirely numeric".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_format() {
        let hash = hash_password("test_password_123").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains("m=65536"));
        assert!(hash.contains("t=3"));
        assert!(hash.contains("p=4"));
    }

    #[test]
    fn test_hash_password_produces_different_salts() {
        let hash1 = hash_password("same_password").unwrap();
        let hash2 = hash_password("same_password").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correct_password").unwrap();

        assert!(verify_password("correct_password", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(matches!(
            verify_password("password", "invalid_hash"),
            Err(PasswordError::InvalidHash(_))
        ));
        // Parses as a PHC string but can never match
        assert!(matches!(
            verify_password("password", "$argon2id$invalid"),
            Ok(false) | Err(_)
        ));
    }

    #[test]
    fn test_validate_password_rules() {
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password("12345abc").is_ok());
        assert!(validate_password("пароль-ок").is_ok());

        let err = validate_password("short").unwrap_err();
        assert!(err.to_string().contains("at least 8 characters"));

        let err = validate_password("1234567890").unwrap_err();
        assert!(err.to_string().contains("entirely numeric"));
    }
}
