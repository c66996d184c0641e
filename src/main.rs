/// Flowforge: workflow automation execution engine
///
/// Main entry point for the Flowforge server. Loads configuration from the
/// environment and starts the HTTP server.

use flowforge::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Workflow management API at /api/workflows/*
/// - Manual runs at /api/workflows/{id}/run
/// - Webhook runs at /webhook/{workflow_id}
/// - Run history at /api/executions/* and /api/execution-details/*
/// - Credentials at /api/credentials/*
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
