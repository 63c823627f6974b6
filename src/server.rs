/// Server setup and initialization
///
/// Wires together all components: database pool, repository, and HTTP routes.
/// Provides the main application factory function for creating the Axum app.

use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use tokio::net::TcpListener;

use crate::{
    api::workflows::{create_workflow_routes, AppState},
    config::Config,
    workflow::repository::WorkflowRepository,
};

/// Create the main Axum application with all routes
///
/// Initializes the data directory, the SQLite pool and the workflow
/// repository, then wires them into a complete application.
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("📁 Ensuring data directory exists: {}", config.database.data_dir);
    std::fs::create_dir_all(&config.database.data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory: {}", e))?;

    let db_path = config.database.db_path();
    tracing::info!("🗄️ Opening workflow database: {}", db_path);
    let options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;

    tracing::info!("📋 Initializing workflow repository");
    let repository = WorkflowRepository::new(pool);
    repository.init_schema().await?;

    let state = AppState {
        repository: Arc::new(repository),
    };

    tracing::info!("📡 Creating HTTP router");
    let app = Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        // Workflow structure + tool endpoints
        .merge(create_workflow_routes().with_state(state));

    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Flowvault server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
