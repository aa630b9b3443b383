//! # LMS API Server
//!
//! Serves the course, lesson, subscription, payment and account endpoints.
//! Background work (notification mail, account deactivation) is handed to
//! `lms-worker` through the `jobs` table.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://... JWT_SECRET=... cargo run -p lms-api
//! ```

use std::sync::Arc;

use anyhow::Context;
use lms_api::{
    app::{build_router, AppState},
    config::Config,
};
use lms_shared::{
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    payments::{
        orchestrator::PaymentOrchestrator,
        stripe::{StripeClient, StripeConfig},
    },
};
use secrecy::ExposeSecret;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lms_api=debug,lms_shared=debug,tower_http=debug".into());

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

fn payment_orchestrator(config: &Config) -> anyhow::Result<Option<PaymentOrchestrator>> {
    let Some(key) = &config.payments.stripe_secret_key else {
        tracing::warn!("STRIPE_SECRET_KEY not set; payment creation disabled");
        return Ok(None);
    };

    let stripe = StripeConfig::new(key.expose_secret().clone())
        .with_base_url(config.payments.stripe_api_base.clone())
        .with_redirect_urls(
            config.payments.success_url.clone(),
            config.payments.cancel_url.clone(),
        );
    let client = StripeClient::new(stripe).context("Failed to build Stripe client")?;

    Ok(Some(PaymentOrchestrator::new(
        Arc::new(client),
        config.payments.currency.clone(),
    )))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("LMS API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let pool = create_pool(
        DatabaseConfig::new(config.database.url.clone())
            .with_max_connections(config.database.max_connections),
    )
    .await
    .context("Failed to connect to database")?;

    run_migrations(&pool).await.context("Failed to run migrations")?;

    let payments = payment_orchestrator(&config)?;
    let address = config.bind_address();

    let state = AppState::new(pool.clone(), config, payments);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}
