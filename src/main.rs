/// Flowrunner: typed node-graph workflow runner
///
/// Main entry point. Loads configuration from the environment and starts the
/// HTTP server.

use flowrunner::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Workflow execution at /api/run-workflow/
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // FLOWRUNNER_* variables, defaulting to 0.0.0.0:8000
    let config = Config::from_env();

    start_server(config).await?;

    Ok(())
}
