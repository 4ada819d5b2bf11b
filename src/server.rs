/// Server setup and initialization
///
/// Wires together all components: LLM client, mailer, processor registry,
/// execution engine, and HTTP routes. Provides the main application factory
/// function for creating the Axum app.

use crate::{
    api::{create_workflow_routes, AppState},
    config::Config,
    llm::{LlmClient, OpenAiCompatibleClient, UnconfiguredClient},
    mail::{HttpRelayMailer, Mailer, UnconfiguredMailer},
    runtime::{ProcessorContext, ProcessorRegistry, WorkflowEngine},
};
use anyhow::Result;
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Create the main Axum application with all routes and middleware
pub async fn create_app(config: Config) -> Result<Router> {
    create_app_with_shutdown(config, CancellationToken::new()).await
}

/// Like `create_app`, with in-flight runs cancelled when `shutdown` fires
pub async fn create_app_with_shutdown(config: Config, shutdown: CancellationToken) -> Result<Router> {
    tracing::info!("🤖 Initializing language-model client");
    let llm: Arc<dyn LlmClient> = match &config.llm.api_key {
        Some(api_key) => Arc::new(
            OpenAiCompatibleClient::new(
                config.llm.base_url.clone(),
                api_key.clone(),
                Duration::from_secs(config.llm.timeout_secs),
            )
            .map_err(|e| anyhow::anyhow!("Failed to initialize LLM client: {}", e))?,
        ),
        None => {
            tracing::warn!("⚠️ No LLM API key configured; prompt, logic and email nodes will fail");
            Arc::new(UnconfiguredClient)
        }
    };

    tracing::info!("📧 Initializing mailer");
    let mailer: Arc<dyn Mailer> = match &config.mail.relay_url {
        Some(relay_url) => Arc::new(HttpRelayMailer::new(relay_url.clone())),
        None => {
            tracing::warn!("⚠️ No mail relay configured; email nodes will report a configuration error");
            Arc::new(UnconfiguredMailer)
        }
    };

    let context = ProcessorContext::new(llm, mailer)
        .with_models(config.llm.models.clone())
        .with_mail_settings(config.mail.settings());

    tracing::info!("🧩 Initializing processor registry");
    let registry = Arc::new(ProcessorRegistry::with_builtins());

    tracing::info!(
        "🚀 Initializing execution engine ({:?} results, {:?} scheduling)",
        config.engine.result_mode,
        config.engine.execution_mode
    );
    let engine = Arc::new(WorkflowEngine::new(registry, context).with_options(config.engine));

    let app_state = AppState {
        engine,
        shutdown,
        max_body_bytes: config.server.max_body_bytes,
    };

    tracing::info!("📡 Creating HTTP router with all endpoints");
    let app = Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        // Workflow execution API
        .merge(create_workflow_routes().with_state(app_state))
        .layer(DefaultBodyLimit::max(config.server.max_body_bytes));

    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Start the HTTP server with the given configuration
///
/// Runs until Ctrl-C; runs still in flight at that point are cancelled.
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging (RUST_LOG, default info)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting flowrunner server...");

    let shutdown = CancellationToken::new();
    let app = create_app_with_shutdown(config.clone(), shutdown.clone()).await?;

    // Bind to the configured address
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Shutdown requested, cancelling in-flight runs");
    shutdown.cancel();
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
