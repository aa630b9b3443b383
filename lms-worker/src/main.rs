//! # LMS Worker
//!
//! Runs background jobs handed over by the API through the `jobs` table:
//! course update mail and the daily deactivation of inactive accounts.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://... MAIL_BACKEND=log cargo run -p lms-worker
//! ```

use std::sync::Arc;

use anyhow::Context;
use lms_shared::{
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    store::postgres::PgStore,
};
use lms_worker::{
    config::{MailBackend, WorkerConfig},
    mailer::{LogMailer, Mailer, ResendMailer},
    orchestrator::{OrchestratorConfig, WorkerOrchestrator},
    queue::JobQueue,
    runner::JobRunner,
    scheduler::DeactivationScheduler,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lms_worker=debug,lms_shared=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn build_mailer(backend: &MailBackend) -> anyhow::Result<Arc<dyn Mailer>> {
    let mailer: Arc<dyn Mailer> = match backend {
        MailBackend::Log => Arc::new(LogMailer),
        MailBackend::Resend { api_key } => Arc::new(
            ResendMailer::new(api_key.clone()).context("Failed to build Resend client")?,
        ),
    };

    tracing::info!(mailer = mailer.name(), "Mail transport ready");
    Ok(mailer)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("LMS Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;

    let pool = create_pool(
        DatabaseConfig::new(config.database_url.clone())
            .with_max_connections(config.database_max_connections),
    )
    .await
    .context("Failed to connect to database")?;

    run_migrations(&pool).await.context("Failed to run migrations")?;

    let store = Arc::new(PgStore::new(pool.clone()));
    let mailer = build_mailer(&config.mail)?;
    let runner = JobRunner::new(store.clone(), store.clone(), mailer, config.from_email.clone());

    let orchestrator = WorkerOrchestrator::new(
        JobQueue::new(pool.clone()),
        runner,
        OrchestratorConfig {
            poll_interval_secs: config.poll_interval_secs,
            batch_size: config.batch_size,
        },
    );
    let shutdown = orchestrator.shutdown_token();

    let scheduler = DeactivationScheduler::new(
        store,
        config.deactivation_hour_utc,
        config.inactive_user_days,
        config.max_attempts,
    );
    let scheduler_handle = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { scheduler.run(shutdown).await }
    });

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received");
        shutdown.cancel();
    });

    tracing::info!("Worker ready and polling for jobs");
    orchestrator.run().await?;

    if let Err(e) = scheduler_handle.await {
        tracing::error!(error = %e, "Scheduler task failed");
    }

    close_pool(pool).await;
    tracing::info!("Worker stopped");

    Ok(())
}
