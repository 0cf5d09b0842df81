/// Stateway: state-language definition repository
///
/// Main entry point. Loads configuration from the environment and starts the
/// HTTP server:
/// - Definition API at /api/definitions/*
/// - Health check at /healthz

use stateway::{config::Config, server::start_server};

/// Application entry point
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (defaults to 0.0.0.0:3004 and data/stateway.db)
    let config = Config::default();

    start_server(config).await
}
