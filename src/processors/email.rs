/// API node, currently email only
///
/// Recipients come from the first upstream output's `extracted_data.email`;
/// the body is written by the language model from every raw node value in the
/// run, in submission order. Nothing here aborts the run: failures are reported
/// as `{"status": "error", ...}` outputs.

use super::render_input;
use crate::llm::ChatMessage;
use crate::mail::{EmailMessage, MISSING_TRANSPORT};
use crate::runtime::{NodeProcessor, ProcessorContext};
use crate::workflow::types::{NodeInputBundle, NodeValues};
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

const SYSTEM_PROMPT: &str = "Generate a formal email based on the given context.";

const EMAIL_INSTRUCTIONS: &str = r#"ADVANCED EMAIL GENERATION INSTRUCTIONS:

PRIMARY OBJECTIVE:
- Generate a professional, nuanced communication that reflects strategic organizational communication
- Approach the content from a leadership perspective
- Demonstrate depth of insight beyond a standard template response

COMMUNICATION GUIDELINES:
- Write as a senior executive or strategic decision-maker
- Avoid generic, templated language
- Use varied sentence structures and tone

CONTEXT ANALYSIS: {context}

CRITICAL CONSTRAINTS:
- DO NOT mention specific recipient names or emails
- Do NOT use salutations like "Dear Hiring Team"
- Avoid repetitive phrases
- Keep the tone authoritative yet engaging
- Maximum length: 50 words

CONTENT STRUCTURE:
1. Open with a compelling, context-driven statement
2. Provide substantive insight or decision
3. Hint at broader strategic implications
4. Close with a forward-looking, action-oriented statement

PROHIBITED ELEMENTS:
- First-person narrative ("I am writing...")
- Direct references to the review process
- Overly administrative language
- Passive constructions

GENERATE A SINGLE, COHESIVE COMMUNICATION"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct EmailProcessor;

#[async_trait]
impl NodeProcessor for EmailProcessor {
    async fn process(
        &self,
        ctx: &ProcessorContext,
        label: &str,
        bundle: &NodeInputBundle,
        values: &NodeValues,
    ) -> anyhow::Result<Value> {
        if bundle.input.as_str() != Some("email") {
            return Ok(error_output("Not an email processing node"));
        }

        let recipients = recipients(bundle);
        if recipients.is_empty() {
            return Ok(error_output("No emails found to send."));
        }
        if !ctx.mailer.is_configured() {
            tracing::warn!("⚠️ Email node '{}' has no mail transport", label);
            return Ok(error_output(MISSING_TRANSPORT));
        }

        tracing::info!("📧 Email node '{}' sending to {} recipient(s)", label, recipients.len());

        match compose_and_send(ctx, values, &recipients).await {
            Ok(()) => Ok(json!({
                "status": "success",
                "message": "Emails sent successfully to recipients.",
                "recipients": recipients,
            })),
            Err(e) => {
                tracing::warn!("⚠️ Email node '{}' failed: {:#}", label, e);
                Ok(error_output(&format!("Email processing failed: {:#}", e)))
            }
        }
    }
}

fn error_output(message: &str) -> Value {
    json!({ "status": "error", "message": message })
}

/// Addresses under `extracted_data.email` of the first upstream output.
/// A single string is treated as a one-element list.
fn recipients(bundle: &NodeInputBundle) -> Vec<String> {
    let emails = bundle
        .previous_output
        .values()
        .next()
        .and_then(|output| output.get("extracted_data"))
        .and_then(|data| data.get("email"));

    match emails {
        Some(Value::String(address)) if !address.trim().is_empty() => vec![address.trim().to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

async fn compose_and_send(ctx: &ProcessorContext, values: &NodeValues, recipients: &[String]) -> Result<()> {
    let from = ctx
        .mail
        .from
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Configuration Error: no sender address configured"))?;

    let context = values.values().map(render_input).collect::<Vec<_>>().join(" ");
    let reply = ctx
        .llm
        .chat(
            &ctx.models.email,
            vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(EMAIL_INSTRUCTIONS.replace("{context}", &context)),
            ],
        )
        .await?;

    let message = EmailMessage {
        from,
        to: recipients.to_vec(),
        subject: ctx.mail.subject.clone(),
        body: strip_markup(&reply)?,
    };
    ctx.mailer.send(&message).await
}

/// Removes tagged blocks (e.g. a model's `<think>...</think>`) and any
/// leftover standalone tags
fn strip_markup(text: &str) -> Result<String> {
    let block_re = Regex::new(r"(?s)<[^>]+>.*?</[^>]+>")?;
    let tag_re = Regex::new(r"<[^>]+>")?;
    let without_blocks = block_re.replace_all(text.trim(), "");
    Ok(tag_re.replace_all(&without_blocks, "").trim().to_string())
}
