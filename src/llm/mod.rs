/// Language-model client used by prompt, logic and email nodes
///
/// Talks to any OpenAI-compatible chat-completions endpoint (Groq by default).

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_PROMPT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_LOGIC_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_EMAIL_MODEL: &str = "deepseek-r1-distill-llama-70b";

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Model name per node family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSet {
    pub prompt: String,
    pub logic: String,
    pub email: String,
}

impl Default for ModelSet {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT_MODEL.to_string(),
            logic: DEFAULT_LOGIC_MODEL.to_string(),
            email: DEFAULT_EMAIL_MODEL.to_string(),
        }
    }
}

/// Chat-completion capability shared by all LLM-backed nodes
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the conversation and return the first choice's text
    async fn chat(&self, model: &str, messages: Vec<ChatMessage>) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible HTTP client (OpenAI, Groq, Ollama, vLLM, ...)
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatibleClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build LLM HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn chat(&self, model: &str, messages: Vec<ChatMessage>) -> Result<String> {
        tracing::debug!("🤖 LLM request: model={} messages={}", model, messages.len());
        let started = std::time::Instant::now();

        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model,
                messages: &messages,
            })
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("LLM request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("LLM request returned {}: {}", status, body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to decode LLM response: {}", e))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("LLM response contained no choices"))?;

        tracing::debug!("🤖 LLM response: {} chars in {:?}", content.len(), started.elapsed());
        Ok(content.trim().to_string())
    }
}

/// Stand-in used when no API key is configured; every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredClient;

#[async_trait]
impl LlmClient for UnconfiguredClient {
    async fn chat(&self, model: &str, _messages: Vec<ChatMessage>) -> Result<String> {
        Err(anyhow::anyhow!(
            "LLM client is not configured (no API key); cannot call model {}",
            model
        ))
    }
}
