//! Database layer
//!
//! - [`pool`]: connection pool construction, health and shutdown
//! - [`migrations`]: embedded schema migrations
//!
//! Row types and their queries live in [`crate::models`]; the storage ports
//! built on top of them live in [`crate::store`].
//!
//! ```no_run
//! use lms_shared::db::{migrations::run_migrations, pool::{create_pool, DatabaseConfig}};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(DatabaseConfig::new(std::env::var("DATABASE_URL")?)).await?;
//! run_migrations(&pool).await?;
//! # Ok(())
//! # }
//! ```

pub mod migrations;
pub mod pool;
