use super::labelled_error;
use crate::runtime::{NodeProcessor, ProcessorContext};
use crate::workflow::types::{NodeInputBundle, NodeValues, RawValue};
use async_trait::async_trait;
use serde_json::Value;

/// Emits the node's value as structured JSON, parsing it first when it
/// arrives as a string
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonInputProcessor;

#[async_trait]
impl NodeProcessor for JsonInputProcessor {
    async fn process(
        &self,
        _ctx: &ProcessorContext,
        label: &str,
        bundle: &NodeInputBundle,
        _values: &NodeValues,
    ) -> anyhow::Result<Value> {
        Ok(match &bundle.input {
            RawValue::Json(Value::String(text)) => match serde_json::from_str::<Value>(text) {
                Ok(parsed) => parsed,
                Err(e) => labelled_error(label, e),
            },
            RawValue::Json(value) => value.clone(),
            RawValue::Files(_) => labelled_error(label, "expected JSON data, got uploaded files"),
        })
    }
}
