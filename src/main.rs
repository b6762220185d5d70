//! Quillpost - a blogging REST API

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quillpost::{
    api::{self, AppState},
    config::Config,
    db,
    services::EmailService,
};

const BLACKLIST_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quillpost=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Quillpost...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");
    if config.auth.secret_key == quillpost::config::INSECURE_DEFAULT_SECRET {
        tracing::warn!("auth.secret_key is the built-in development secret; set QUILLPOST_AUTH_SECRET_KEY");
    }

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {}", config.database.url);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let email = EmailService::from_config(&config.email)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let public_url = config.server.base_url().to_string();
    let state = AppState::new(pool, config, email);
    spawn_blacklist_purge(state.clone());
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on {} (public URL {})", addr, public_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Periodically drop blacklist rows for refresh tokens that have expired
fn spawn_blacklist_purge(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(BLACKLIST_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = state.token_service.purge_expired().await {
                tracing::warn!("Failed to purge token blacklist: {}", e);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
