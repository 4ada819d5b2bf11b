use super::labelled_error;
use crate::runtime::{NodeProcessor, ProcessorContext};
use crate::workflow::types::{NodeInputBundle, NodeValues};
use async_trait::async_trait;
use serde_json::Value;

/// Emits the node's text value unchanged
///
/// Accepts a bare string or `{"text": "..."}`; anything else becomes a
/// labelled error output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextInputProcessor;

#[async_trait]
impl NodeProcessor for TextInputProcessor {
    async fn process(
        &self,
        _ctx: &ProcessorContext,
        label: &str,
        bundle: &NodeInputBundle,
        _values: &NodeValues,
    ) -> anyhow::Result<Value> {
        let text = match bundle.input.as_json() {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Object(map)) => map.get("text").and_then(Value::as_str).map(str::to_string),
            _ => None,
        };

        Ok(match text {
            Some(text) => Value::String(text),
            None => labelled_error(label, "Input data must be a string."),
        })
    }
}
