mod config;
mod error;
mod middleware;
mod routes;
mod scheduler;
mod state;

use std::sync::Arc;

use snapshot_publisher_core::document::dynamic::ConventionRegistry;
use snapshot_publisher_core::events::bus::EventBus;
use snapshot_publisher_core::storage::{AnyStore, MemoryStore, PgStore};
use snapshot_publisher_core::Publisher;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience)
    let _ = dotenvy::dotenv();

    let config = config::AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    tracing::info!("Starting snapshot publisher API server");

    let store = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .min_connections(config.db_min_connections)
                .connect(url)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to database: {e}"))?;
            tracing::info!("Connected to PostgreSQL");

            sqlx::migrate!("../../migrations")
                .run(&pool)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;
            tracing::info!("Database migrations applied");

            AnyStore::Postgres(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, releases are kept in memory only");
            AnyStore::Memory(MemoryStore::new())
        }
    };

    let event_bus = EventBus::new(config.event_bus_capacity);
    let publisher = Publisher::new(store, event_bus, Arc::new(ConventionRegistry));

    let settler = config
        .settle_interval()
        .map(|period| scheduler::spawn(publisher.clone(), period));

    let state = state::AppState::new(publisher, config.clone());

    let app = routes::build_router(state).layer(
        ServiceBuilder::new()
            .layer(middleware::request_tracing::trace_layer())
            .layer(middleware::cors::cors_layer())
            .map_response(axum::response::IntoResponse::into_response)
            .layer(middleware::request_tracing::body_limit_layer(
                config.max_body_bytes,
            )),
    );

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(settler) = settler {
        settler.abort();
    }
    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { tracing::info!("Received Ctrl+C, shutting down..."); }
        _ = terminate => { tracing::info!("Received SIGTERM, shutting down..."); }
    }
}
