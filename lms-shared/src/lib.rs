//! # LMS Shared Library
//!
//! Domain types and business rules shared by the API server (`lms-api`) and
//! the background worker (`lms-worker`).
//!
//! ## Module Organization
//!
//! - `models`: database rows and their queries
//! - `db`: connection pool and migrations
//! - `store`: storage ports with Postgres and in-memory implementations
//! - `auth`: tokens, passwords, actors and the access policy
//! - `subscriptions`: the course subscription toggle
//! - `notifications`: course update notification hand-off and throttle
//! - `payments`: payment provider port and checkout orchestration
//! - `validation`: field-level validation shared by the API

pub mod auth;
pub mod db;
pub mod models;
pub mod notifications;
pub mod payments;
pub mod store;
pub mod subscriptions;
pub mod validation;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
