/// Built-in node processors
///
/// One processor per node type the workflow editor emits:
/// - `textInput` / `jsonInput`: pass caller-supplied values through
/// - `fileInput`: decode uploaded files by extension
/// - `promptNode` / `logicNode`: LLM extraction into structured JSON
/// - `apiNode`: LLM-written email delivered through the configured mailer

pub mod email;
pub mod file_input;
pub mod json_input;
pub mod logic;
pub mod prompt;
pub mod text_input;

pub use email::EmailProcessor;
pub use file_input::FileInputProcessor;
pub use json_input::JsonInputProcessor;
pub use logic::LogicProcessor;
pub use prompt::PromptProcessor;
pub use text_input::TextInputProcessor;

use crate::runtime::ProcessorRegistry;
use crate::workflow::types::{NodeInputBundle, RawValue};
use serde_json::{json, Value};
use std::sync::Arc;

pub const TEXT_INPUT: &str = "textInput";
pub const JSON_INPUT: &str = "jsonInput";
pub const FILE_INPUT: &str = "fileInput";
pub const PROMPT_NODE: &str = "promptNode";
pub const LOGIC_NODE: &str = "logicNode";
pub const API_NODE: &str = "apiNode";

impl ProcessorRegistry {
    /// Registry preloaded with every built-in node type
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry);
        registry
    }
}

pub fn register_builtins(registry: &mut ProcessorRegistry) {
    registry.register(TEXT_INPUT, Arc::new(TextInputProcessor));
    registry.register(JSON_INPUT, Arc::new(JsonInputProcessor));
    registry.register(FILE_INPUT, Arc::new(FileInputProcessor));
    registry.register(PROMPT_NODE, Arc::new(PromptProcessor));
    registry.register(LOGIC_NODE, Arc::new(LogicProcessor));
    registry.register(API_NODE, Arc::new(EmailProcessor));
    tracing::debug!("🧩 Registered {} built-in node processors", registry.node_types().len());
}

/// `{"error": "Error processing <label>: <reason>"}`
pub(crate) fn labelled_error(label: &str, reason: impl std::fmt::Display) -> Value {
    json!({ "error": format!("Error processing {}: {}", label, reason) })
}

/// Text shown to the model for a node's own raw value
pub(crate) fn render_input(input: &RawValue) -> String {
    match input.as_json() {
        Some(Value::String(text)) => text.clone(),
        _ => input.to_json().to_string(),
    }
}

/// User turn shared by prompt and logic nodes
pub(crate) fn extraction_prompt(bundle: &NodeInputBundle) -> String {
    format!(
        "Input Data: {}\n\nUser Prompt: {}\n\nReturn the JSON output",
        Value::Object(bundle.previous_output.clone()),
        render_input(&bundle.input)
    )
}

/// Parse model output as JSON, or report it verbatim as a structured error
pub(crate) fn decode_model_json(text: &str) -> Value {
    match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("⚠️ Model output is not valid JSON: {}", e);
            json!({
                "status": "error",
                "message": "Failed to decode JSON",
                "raw_output": text,
            })
        }
    }
}
