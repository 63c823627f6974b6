/// Flowvault: workflow definition vault
///
/// Main entry point for the Flowvault server. Initializes configuration and
/// starts the HTTP server with workflow storage and tool endpoints.

use flowvault::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Workflow structure fetch/sync at /workflow/{id}
/// - The agent-tool contract at /tool/workflow
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (defaults to 0.0.0.0:3005 and a SQLite database)
    let config = Config::default();

    // Start the server
    start_server(config).await?;

    Ok(())
}
