/// HTTP API Layer
///
/// Stateless workflow execution over HTTP. It handles:
/// - Decoding multipart and JSON run requests
/// - Driving the engine for each request
/// - Mapping engine errors to status codes

// Error responses
pub mod error;

// Multipart / JSON body decoding
pub mod request;

// Workflow execution endpoints
pub mod workflows;

// Re-export router builder and shared types
pub use error::ApiError;
pub use request::{FormPart, RunRequest};
pub use workflows::{create_workflow_routes, AppState};
