/// Run-request decoding
///
/// A workflow run arrives either as `multipart/form-data` (what the editor
/// sends, with file uploads) or as a plain JSON body:
///
/// - `nodes`, `edges`: JSON lists (form fields carry them as JSON text)
/// - `nodeValues_<nodeId>`: a node's raw value; JSON when it parses, raw text otherwise
/// - `files_<nodeId>_<index>`: uploaded file parts; these replace any text value
///   for the same node
/// - JSON bodies carry values as a `nodeValues` object instead

use super::error::ApiError;
use crate::workflow::types::{Edge, FilePayload, Node, NodeValues, RawValue};
use serde_json::Value;
use indexmap::IndexMap;

const VALUE_PREFIX: &str = "nodeValues_";
const FILE_PREFIX: &str = "files_";

/// Decoded body of a run request
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub values: NodeValues,
}

/// One multipart form part, already read into memory
#[derive(Debug, Clone)]
pub struct FormPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            content_type: None,
            data: value.into().into_bytes(),
        }
    }

    pub fn file(name: impl Into<String>, file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            file_name: Some(file_name.into()),
            content_type: None,
            data: data.into(),
        }
    }

    fn as_text(&self) -> Result<&str, ApiError> {
        std::str::from_utf8(&self.data)
            .map_err(|_| ApiError::bad_request(format!("form field '{}' is not valid UTF-8", self.name)))
    }
}

impl RunRequest {
    /// Decode a multipart form
    pub fn from_form(parts: Vec<FormPart>) -> Result<Self, ApiError> {
        let mut raw_nodes = Value::String("[]".to_string());
        let mut raw_edges = Value::String("[]".to_string());
        let mut values = NodeValues::new();
        let mut files: IndexMap<String, Vec<FilePayload>> = IndexMap::new();

        for part in parts {
            if part.name == "nodes" {
                raw_nodes = Value::String(part.as_text()?.to_string());
            } else if part.name == "edges" {
                raw_edges = Value::String(part.as_text()?.to_string());
            } else if let Some(node_id) = part.name.strip_prefix(VALUE_PREFIX) {
                let text = part.as_text()?;
                let value = serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()));
                values.insert(node_id.to_string(), RawValue::Json(value));
            } else if let Some(rest) = part.name.strip_prefix(FILE_PREFIX) {
                let node_id = file_node_id(rest).to_string();
                let file_name = part.file_name.clone().unwrap_or_else(|| part.name.clone());
                files.entry(node_id).or_default().push(FilePayload {
                    name: file_name,
                    content_type: part.content_type,
                    bytes: part.data,
                });
            } else {
                tracing::debug!("🔍 Ignoring unknown form field '{}'", part.name);
            }
        }

        for (node_id, node_files) in files {
            values.insert(node_id, RawValue::Files(node_files));
        }

        Self::assemble(raw_nodes, raw_edges, values)
    }

    /// Decode a JSON body `{"nodes": [...], "edges": [...], "nodeValues": {...}}`
    pub fn from_json(body: &[u8]) -> Result<Self, ApiError> {
        let body: Value =
            serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid JSON body: {}", e)))?;
        let Value::Object(mut body) = body else {
            return Err(ApiError::bad_request("request body must be a JSON object"));
        };

        let raw_nodes = body.remove("nodes").unwrap_or_else(|| Value::Array(Vec::new()));
        let raw_edges = body.remove("edges").unwrap_or_else(|| Value::Array(Vec::new()));
        let values = match body.remove("nodeValues") {
            None | Some(Value::Null) => NodeValues::new(),
            Some(Value::Object(map)) => map.into_iter().map(|(id, value)| (id, RawValue::Json(value))).collect(),
            Some(_) => return Err(ApiError::bad_request("'nodeValues' must be an object")),
        };

        Self::assemble(raw_nodes, raw_edges, values)
    }

    fn assemble(raw_nodes: Value, raw_edges: Value, values: NodeValues) -> Result<Self, ApiError> {
        let (Some(nodes), Some(edges)) = (as_list(raw_nodes), as_list(raw_edges)) else {
            return Err(ApiError::bad_request(
                "Invalid data format. 'nodes' and 'edges' must be valid lists.",
            ));
        };
        if nodes.is_empty() {
            return Err(ApiError::bad_request("At least one node must be provided."));
        }

        let nodes: Vec<Node> = serde_json::from_value(Value::Array(nodes))
            .map_err(|e| ApiError::bad_request(format!("invalid node definition: {}", e)))?;
        let edges: Vec<Edge> = serde_json::from_value(Value::Array(edges))
            .map_err(|e| ApiError::bad_request(format!("invalid edge definition: {}", e)))?;

        Ok(Self { nodes, edges, values })
    }
}

/// A list given directly or as JSON text
fn as_list(raw: Value) -> Option<Vec<Value>> {
    match raw {
        Value::Array(items) => Some(items),
        Value::String(text) => match serde_json::from_str(&text) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

/// `node_3_0` → `node_3`; a suffix-less key names the node directly
fn file_node_id(rest: &str) -> &str {
    match rest.rsplit_once('_') {
        Some((node_id, index)) if !node_id.is_empty() && index.chars().all(|c| c.is_ascii_digit()) => node_id,
        _ => rest,
    }
}
