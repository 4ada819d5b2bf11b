/// Workflow execution REST API endpoints
///
/// A single stateless resource: the caller submits a whole graph plus raw node
/// values and gets every node's result back in the same response.

use super::{
    error::ApiError,
    request::{FormPart, RunRequest},
};
use crate::runtime::WorkflowEngine;
use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Engine shared by every request
    pub engine: Arc<WorkflowEngine>,
    /// Cancelled on shutdown; each run watches a child token
    pub shutdown: CancellationToken,
    /// Largest accepted body, uploads included
    pub max_body_bytes: usize,
}

/// Create workflow execution routes
pub fn create_workflow_routes() -> Router<AppState> {
    Router::new().route("/api/run-workflow/", get(welcome).post(run_workflow))
}

/// GET /api/run-workflow/
async fn welcome() -> Json<Value> {
    Json(json!({ "message": "Welcome to the Workflow API" }))
}

/// Execute a submitted workflow
///
/// POST /api/run-workflow/
/// Body: multipart form (`nodes`, `edges`, `nodeValues_<id>`, `files_<id>_<n>`)
///       or JSON `{ "nodes": [...], "edges": [...], "nodeValues": {...} }`
/// Returns: { "message": "...", "run_id": "...", "started_at": "...", "results": {...} }
async fn run_workflow(State(state): State<AppState>, request: Request) -> Result<Json<Value>, ApiError> {
    let run_request = decode_request(&state, request).await?;
    tracing::info!(
        "📥 Run request received: {} nodes, {} edges, {} node values",
        run_request.nodes.len(),
        run_request.edges.len(),
        run_request.values.len()
    );

    let mut run = state
        .engine
        .prepare(&run_request.nodes, &run_request.edges, run_request.values)?;
    let run_id = run.run_id();
    let started_at = run.started_at();

    let results = run.execute(state.shutdown.child_token()).await?;

    Ok(Json(json!({
        "message": "Workflow executed successfully!",
        "run_id": run_id.to_string(),
        "started_at": started_at.to_rfc3339(),
        "results": results,
    })))
}

async fn decode_request(state: &AppState, request: Request) -> Result<RunRequest, ApiError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("invalid multipart request: {}", e)))?;
        RunRequest::from_form(read_parts(multipart).await?)
    } else {
        let body = axum::body::to_bytes(request.into_body(), state.max_body_bytes)
            .await
            .map_err(|e| ApiError::bad_request(format!("unreadable request body: {}", e)))?;
        RunRequest::from_json(&body)
    }
}

async fn read_parts(mut multipart: Multipart) -> Result<Vec<FormPart>, ApiError> {
    let mut parts = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read form field '{}': {}", name, e)))?;

        tracing::debug!("📎 Form field '{}' ({} bytes)", name, data.len());
        parts.push(FormPart {
            name,
            file_name,
            content_type,
            data: data.to_vec(),
        });
    }
    Ok(parts)
}
