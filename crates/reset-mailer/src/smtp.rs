//! SMTP relay transport
//!
//! Sends the composed reset email as multipart/alternative (plain text +
//! HTML) through the configured relay. One attempt per call, no retries.

use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, instrument};

use crate::config::SmtpConfig;
use crate::types::ResetEmail;

/// Outbound mail delivery
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &ResetEmail) -> Result<(), MailError>;
}

#[async_trait]
impl<T: MailTransport + ?Sized> MailTransport for std::sync::Arc<T> {
    async fn send(&self, email: &ResetEmail) -> Result<(), MailError> {
        (**self).send(email).await
    }
}

/// SMTP relay sender
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build a pooled transport from relay settings.
    ///
    /// Nothing is contacted here; an unreachable or misconfigured relay only
    /// surfaces when a message is sent.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| MailError::Transport(e.to_string()))?
        .port(config.port);

        let builder = if config.has_credentials() {
            builder.credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
        } else {
            builder
        };

        Ok(Self {
            transport: builder.build(),
        })
    }
}

/// Convert a composed reset email into a MIME message
pub fn build_message(email: &ResetEmail) -> Result<Message, MailError> {
    let from: Mailbox = email
        .from
        .parse()
        .map_err(|_| MailError::InvalidAddress(email.from.clone()))?;
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|_| MailError::InvalidAddress(email.to.clone()))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.clone())
        .multipart(MultiPart::alternative_plain_html(
            email.text.clone(),
            email.html.clone(),
        ))
        .map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl MailTransport for SmtpMailer {
    #[instrument(skip(self, email), fields(subject = %email.subject))]
    async fn send(&self, email: &ResetEmail) -> Result<(), MailError> {
        let message = build_message(email)?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        info!(code = %response.code(), "Reset email accepted by relay");
        Ok(())
    }
}

/// Stand-in used when the relay could not be configured at startup.
/// Every send fails with the recorded configuration error.
pub struct UnavailableMailer {
    reason: String,
}

impl UnavailableMailer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl MailTransport for UnavailableMailer {
    async fn send(&self, _email: &ResetEmail) -> Result<(), MailError> {
        Err(MailError::Transport(format!(
            "relay unavailable: {}",
            self.reason
        )))
    }
}

/// Mail delivery errors
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP send failed: {0}")]
    Transport(String),
}
