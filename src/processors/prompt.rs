use super::{decode_model_json, extraction_prompt};
use crate::llm::ChatMessage;
use crate::runtime::{NodeProcessor, ProcessorContext};
use crate::workflow::types::{NodeInputBundle, NodeValues};
use async_trait::async_trait;
use serde_json::Value;

const SYSTEM_PROMPT: &str = r#"You are an AI that processes any type of input, including text, JSON, or file-converted strings.
Your task is to analyze the input based on the user prompt, extract relevant information,
and return a structured JSON response.

**Instructions:**
- If the input is text, analyze it based on the user's request.
- If the input is JSON, extract relevant fields and process them accordingly.
- If the input is a file-converted string (base64-encoded), decode it, analyze the content, and return useful insights.

**Response Format:**
Ensure the response is a valid JSON object with the following structure:
{
    "status": "success",
    "extracted_data": { ... }
}

!!!DON'T GIVE ADDITIONAL DETAILS THAN REQUIRED BY THE USER PROMPT!!!"#;

/// Free-form extraction: the node's value is the instruction, upstream
/// outputs are the material
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptProcessor;

#[async_trait]
impl NodeProcessor for PromptProcessor {
    async fn process(
        &self,
        ctx: &ProcessorContext,
        label: &str,
        bundle: &NodeInputBundle,
        _values: &NodeValues,
    ) -> anyhow::Result<Value> {
        tracing::debug!("💬 Prompt node '{}' with {} upstream output(s)", label, bundle.previous_output.len());

        let reply = ctx
            .llm
            .chat(
                &ctx.models.prompt,
                vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(extraction_prompt(bundle))],
            )
            .await?;

        Ok(decode_model_json(strip_json_fence(&reply)))
    }
}

/// Drops a leading "```json" line and a trailing "```" line, if present
fn strip_json_fence(text: &str) -> &str {
    let text = text.strip_prefix("```json\n").unwrap_or(text);
    text.strip_suffix("\n```").unwrap_or(text)
}
