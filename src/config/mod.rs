/// Configuration management for the flowrunner service
///
/// Handles server binding, engine behaviour, language-model access and mail
/// delivery. Every field can be overridden with a `FLOWRUNNER_*` environment
/// variable for container deployment.

use crate::{
    llm::{ModelSet, DEFAULT_BASE_URL, DEFAULT_EMAIL_MODEL, DEFAULT_LOGIC_MODEL, DEFAULT_PROMPT_MODEL},
    mail::{MailSettings, DEFAULT_SUBJECT},
    runtime::{EngineOptions, ExecutionMode, ResultMode},
};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Result shape and scheduling mode
    pub engine: EngineOptions,
    /// Language-model endpoint and per-node models
    pub llm: LlmConfig,
    /// Outbound mail
    pub mail: MailConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
    /// Largest accepted request body, uploads included
    pub max_body_bytes: usize,
}

/// OpenAI-compatible chat endpoint used by prompt, logic and email nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    /// No key means every LLM-backed node fails its run
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub models: ModelSet,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// HTTP relay that accepts `{from, to, subject, body}`; unset means log only
    pub relay_url: Option<String>,
    pub from: Option<String>,
    pub subject: String,
}

impl MailConfig {
    pub fn settings(&self) -> MailSettings {
        MailSettings {
            from: self.from.clone(),
            subject: self.subject.clone(),
        }
    }
}

impl Config {
    /// Configuration from the process environment
    pub fn from_env() -> Self {
        Self::default()
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("FLOWRUNNER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parsed_env("FLOWRUNNER_PORT", 8000),
                max_body_bytes: parsed_env("FLOWRUNNER_MAX_BODY_BYTES", 25 * 1024 * 1024),
            },
            engine: EngineOptions {
                result_mode: parsed_env("FLOWRUNNER_RESULT_MODE", ResultMode::Full),
                execution_mode: parsed_env("FLOWRUNNER_EXECUTION_MODE", ExecutionMode::Sequential),
            },
            llm: LlmConfig {
                base_url: std::env::var("FLOWRUNNER_LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
                api_key: optional_env("FLOWRUNNER_LLM_API_KEY").or_else(|| optional_env("GROQ_API_KEY")),
                models: ModelSet {
                    prompt: std::env::var("FLOWRUNNER_PROMPT_MODEL")
                        .unwrap_or_else(|_| DEFAULT_PROMPT_MODEL.to_string()),
                    logic: std::env::var("FLOWRUNNER_LOGIC_MODEL").unwrap_or_else(|_| DEFAULT_LOGIC_MODEL.to_string()),
                    email: std::env::var("FLOWRUNNER_EMAIL_MODEL").unwrap_or_else(|_| DEFAULT_EMAIL_MODEL.to_string()),
                },
                timeout_secs: parsed_env("FLOWRUNNER_LLM_TIMEOUT_SECS", 60),
            },
            mail: MailConfig {
                relay_url: optional_env("FLOWRUNNER_MAIL_RELAY_URL"),
                from: optional_env("FLOWRUNNER_MAIL_FROM"),
                subject: std::env::var("FLOWRUNNER_MAIL_SUBJECT").unwrap_or_else(|_| DEFAULT_SUBJECT.to_string()),
            },
        }
    }
}

/// Parsed variable, or the default when unset or unparseable
fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("⚠️ Ignoring invalid {}={:?}, using default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

/// Non-empty variable value
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
