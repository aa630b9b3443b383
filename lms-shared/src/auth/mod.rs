/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and password rules
/// - [`jwt`]: access/refresh token issuance and validation
/// - [`actor`]: request actors, principals and roles
/// - [`authorization`]: the access policy for courses, lessons and accounts
///
/// # Example
///
/// ```no_run
/// use lms_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
/// # Ok(())
/// # }
/// ```

pub mod actor;
pub mod authorization;
pub mod jwt;
pub mod password;
