/// Server setup and initialization
///
/// Wires together all components: database, providers, dispatcher, execution
/// engine and HTTP routes.

use crate::{
    api::{
        create_credential_routes, create_execution_routes, create_webhook_routes, create_workflow_routes, AppState,
    },
    config::Config,
    credentials::CredentialResolver,
    database::Database,
    runtime::{
        executor::AI_CREDENTIAL_SERVICE, ExecutionEngine, LuaSandbox, NodeExecutor, Providers,
    },
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Build the application state over an open database and a set of providers
///
/// Tests pass mock providers here; the server passes network-backed ones.
pub fn build_state(config: &Config, database: &Database, providers: Providers) -> AppState {
    let credential_store = Arc::new(database.credentials());
    let resolver = CredentialResolver::new(credential_store)
        .with_fallback(AI_CREDENTIAL_SERVICE, config.providers.groq_fallback_api_key.clone());

    let executor = Arc::new(NodeExecutor::new(
        providers,
        resolver,
        LuaSandbox::new(&config.sandbox),
        &config.database.files_dir,
    ));

    let runs = Arc::new(database.executions());
    let engine = Arc::new(ExecutionEngine::new(executor, runs.clone()));

    AppState {
        workflows: database.workflows(),
        runs,
        credentials: database.credentials(),
        engine,
    }
}

/// All routes over the given state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .merge(create_workflow_routes())
        .merge(create_webhook_routes())
        .merge(create_execution_routes())
        .merge(create_credential_routes())
        .with_state(state)
}

/// Create the main Axum application with all routes
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("📁 Ensuring files directory exists: {}", config.database.files_dir);
    std::fs::create_dir_all(&config.database.files_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create files directory: {}", e))?;

    let database = Database::open(&config.database.path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?;

    tracing::info!("⚙️ Initializing providers and execution engine");
    let providers = Providers::from_config(&config.providers);
    let state = build_state(&config, &database, providers);

    tracing::info!("✅ Application initialized successfully");
    Ok(router(state))
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Flowforge server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}
