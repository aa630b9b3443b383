//! Schema migrations
//!
//! The SQL files under `lms-shared/migrations/` are embedded at compile time
//! with `sqlx::migrate!`, so both binaries carry the schema they were built
//! against. The API runs them on startup; the worker only checks that they
//! have been applied.

use sqlx::postgres::PgPool;
use tracing::{debug, info, warn};

/// Applied migrations as recorded in `_sqlx_migrations`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MigrationStatus {
    /// Successfully applied migrations
    pub applied: usize,

    /// Embedded migrations known to this binary
    pub known: usize,

    /// Highest applied version
    pub latest_version: Option<i64>,
}

impl MigrationStatus {
    /// True when every embedded migration has been applied
    pub fn is_up_to_date(&self) -> bool {
        self.applied >= self.known
    }
}

fn embedded() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Applies every pending migration
///
/// # Errors
///
/// Fails if a migration does not apply or an applied migration was edited
/// after the fact (checksum mismatch).
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations");

    match embedded().run(pool).await {
        Ok(()) => {
            info!("Database schema is up to date");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Migration failed");
            Err(e)
        }
    }
}

/// Reads the migration bookkeeping table
///
/// A database that has never been migrated reports zero applied migrations.
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let known = embedded().iter().count();

    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public' AND table_name = '_sqlx_migrations'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        debug!("Migration table missing; database never migrated");
        return Ok(MigrationStatus {
            applied: 0,
            known,
            latest_version: None,
        });
    }

    let (applied, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success",
    )
    .fetch_one(pool)
    .await?;

    Ok(MigrationStatus {
        applied: applied as usize,
        known,
        latest_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_migrations_present() {
        let versions: Vec<i64> = embedded().iter().map(|m| m.version).collect();
        assert_eq!(versions.len(), 4);
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_up_to_date() {
        let status = MigrationStatus {
            applied: 4,
            known: 4,
            latest_version: Some(20240101000004),
        };
        assert!(status.is_up_to_date());
        assert!(!MigrationStatus { applied: 3, ..status }.is_up_to_date());
    }
}
