/// Shared services handed to every capability
///
/// The engine never opens this; it is threaded through to processors so tests
/// can substitute fakes for the language-model client and the mailer.

use crate::llm::{LlmClient, ModelSet, UnconfiguredClient};
use crate::mail::{MailSettings, Mailer, UnconfiguredMailer};
use std::sync::Arc;

/// Read-only handle to external clients, cloned cheaply into every run
#[derive(Clone)]
pub struct ProcessorContext {
    /// Chat-completion client used by prompt, logic and email nodes
    pub llm: Arc<dyn LlmClient>,
    /// Outbound mail delivery for email nodes
    pub mailer: Arc<dyn Mailer>,
    /// Model name per node family
    pub models: ModelSet,
    /// Sender and subject for outbound mail
    pub mail: MailSettings,
}

impl ProcessorContext {
    pub fn new(llm: Arc<dyn LlmClient>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            llm,
            mailer,
            models: ModelSet::default(),
            mail: MailSettings::default(),
        }
    }

    /// Context with no language model and no mail transport
    pub fn offline() -> Self {
        Self::new(Arc::new(UnconfiguredClient), Arc::new(UnconfiguredMailer))
    }

    pub fn with_models(mut self, models: ModelSet) -> Self {
        self.models = models;
        self
    }

    pub fn with_mail_settings(mut self, mail: MailSettings) -> Self {
        self.mail = mail;
        self
    }
}

impl std::fmt::Debug for ProcessorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorContext")
            .field("models", &self.models)
            .field("mail", &self.mail)
            .finish_non_exhaustive()
    }
}
