/// Database models for the LMS
///
/// This module contains all database models and their CRUD operations.
///
/// # Models
///
/// - `user`: User accounts and group membership
/// - `course`: Courses with their notification stamp
/// - `lesson`: Lessons belonging to a course
/// - `subscription`: (user, course) subscription pairs
/// - `payment`: Payments for a course or a lesson
/// - `job`: Background jobs consumed by the worker
///
/// # Example
///
/// ```no_run
/// use lms_shared::models::user::{User, CreateUser};
/// use lms_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let new_user = CreateUser {
///     email: "user@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     ..Default::default()
/// };
///
/// let user = User::create(&pool, new_user).await?;
/// # Ok(())
/// # }
/// ```

pub mod course;
pub mod job;
pub mod lesson;
pub mod payment;
pub mod subscription;
pub mod user;
