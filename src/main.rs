//! Caseworks Server
//!
//! REST API server for equipment, rental, fabrication and scheduling workflows.

use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use caseworks_server::{
    api,
    config::AppConfig,
    repository::Repository,
    services::{self, audit::TracingAuditSink, clock::SystemClock, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("caseworks_server={},tower_http=debug", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Caseworks Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    tracing::info!("Connected to database");

    // Save server address before moving config
    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    // Create repository and services
    let repository = Repository::postgres(pool);
    let audit = Arc::new(TracingAuditSink);
    let clock = Arc::new(SystemClock);
    let services = Services::new(repository.clone(), audit.clone(), clock.clone(), &config);

    // Reminder daemon
    let shutdown = CancellationToken::new();
    let reminders = if config.reminders.enabled {
        let channel = services::delivery_channel(&config).await?;
        let reminders = services::reminder_service(&repository, channel, audit, clock, &config);
        tokio::spawn(reminders.clone().run(shutdown.child_token()));
        Some(reminders)
    } else {
        tracing::info!("Reminder service disabled");
        None
    };

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
        reminders,
    };

    // Build router
    let app = api::router(state);

    // Start server
    let addr = SocketAddr::new(server_host.parse()?, server_port);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

/// Resolve on Ctrl-C, cancelling background tasks
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
    shutdown.cancel();
}
