/// Outbound mail delivery for email nodes
///
/// Delivery goes through an HTTP mail relay. Without one, every send fails
/// with a configuration error and nothing is reported as delivered.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SUBJECT: &str = "Important Notice";

/// Reported by email nodes when no transport is configured
pub const MISSING_TRANSPORT: &str = "Configuration Error: Missing mail transport configuration";

/// A message ready to hand to a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Sender identity and subject used by email nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailSettings {
    /// Sender address; email nodes refuse to send without one
    pub from: Option<String>,
    pub subject: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            from: None,
            subject: DEFAULT_SUBJECT.to_string(),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;

    /// Whether `send` can actually deliver anything
    fn is_configured(&self) -> bool {
        true
    }
}

/// POSTs each message as JSON to a relay endpoint
#[derive(Debug, Clone)]
pub struct HttpRelayMailer {
    http: reqwest::Client,
    relay_url: String,
}

impl HttpRelayMailer {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            relay_url: relay_url.into(),
        }
    }
}

#[async_trait]
impl Mailer for HttpRelayMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        tracing::debug!("📧 Relaying mail to {} recipient(s) via {}", message.to.len(), self.relay_url);

        let response = self
            .http
            .post(&self.relay_url)
            .json(message)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Mail relay request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Mail relay returned {}: {}", status, body));
        }
        Ok(())
    }
}

/// Stand-in used when no relay is configured; refuses every message
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredMailer;

#[async_trait]
impl Mailer for UnconfiguredMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        tracing::warn!("📧 Dropping mail to {} recipient(s): no transport configured", message.to.len());
        Err(anyhow::anyhow!(MISSING_TRANSPORT))
    }

    fn is_configured(&self) -> bool {
        false
    }
}
