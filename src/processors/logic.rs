use super::{decode_model_json, extraction_prompt};
use crate::llm::ChatMessage;
use crate::runtime::{NodeProcessor, ProcessorContext};
use crate::workflow::types::{NodeInputBundle, NodeValues};
use async_trait::async_trait;
use serde_json::Value;

const SYSTEM_PROMPT: &str = r#"You are an AI that processes any input, based on logic of the user input.
Your task is to analyze the input based on the user prompt, extract details based off of the logic given by the user,
and return a structured JSON response.

**Instructions:**
Analyze the input based on the user's given logic and extract the required data or process

**Response Format:**
Ensure the response is a valid JSON object with the following structure:
{
    "status": "success",
    "extracted_data": { ... }
}

!!!DON'T GIVE ADDITIONAL DETAILS THAN REQUIRED BY THE USER PROMPT!!!"#;

/// Rule-driven extraction. Same contract as the prompt node, but the reply
/// must be bare JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogicProcessor;

#[async_trait]
impl NodeProcessor for LogicProcessor {
    async fn process(
        &self,
        ctx: &ProcessorContext,
        label: &str,
        bundle: &NodeInputBundle,
        _values: &NodeValues,
    ) -> anyhow::Result<Value> {
        tracing::debug!("🧠 Logic node '{}' with {} upstream output(s)", label, bundle.previous_output.len());

        let reply = ctx
            .llm
            .chat(
                &ctx.models.logic,
                vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(extraction_prompt(bundle))],
            )
            .await?;

        Ok(decode_model_json(&reply))
    }
}
