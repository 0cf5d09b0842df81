/// Server setup and initialization
///
/// Wires together the SQLite store, the definition repository, the optional
/// start-up bulk load and the HTTP routes.

use crate::{
    api::{create_definition_routes, AppState},
    config::Config,
    definition::ParserRegistry,
    repository::DefinitionRepository,
    resource::DirectoryResourceLoader,
    store::SqliteDefinitionStore,
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Build the repository described by `config`
///
/// Connects the store and, when a definitions directory is configured,
/// registers every definition file in it.
pub async fn create_repository(config: &Config) -> Result<Arc<DefinitionRepository>> {
    tracing::info!("🗄️ Connecting definition store: {}", config.database.url);
    let store = SqliteDefinitionStore::connect(&config.database.url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open definition store: {:#}", e))?;

    let repository = DefinitionRepository::new(&config.repository, &ParserRegistry::new())?
        .with_store(Arc::new(store));
    tracing::info!(
        "📊 Initialized definition repository (parser: {}, charset: {})",
        config.repository.parser_name,
        repository.charset()
    );

    if let Some(dir) = &config.repository.definitions_dir {
        tracing::info!("📥 Registering definitions from {}", dir);
        let report = repository.load_resources(&DirectoryResourceLoader::new(dir)).await?;
        for skipped in &report.skipped {
            tracing::warn!("⏭️ Skipped {}: {}", skipped.name, skipped.reason);
        }
    }

    Ok(Arc::new(repository))
}

/// Create the Axum application around an existing repository
pub fn create_router(repository: Arc<DefinitionRepository>) -> Router {
    let app_state = AppState { repository };

    Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        // Definition lookup and registration
        .merge(create_definition_routes().with_state(app_state))
}

/// Create the main Axum application with all routes
pub async fn create_app(config: &Config) -> Result<Router> {
    let repository = create_repository(config).await?;
    let app = create_router(repository);

    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Stateway server...");

    let app = create_app(&config).await?;

    // Bind to the configured address
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
