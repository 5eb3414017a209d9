//! Password reset dispatch
//!
//! One call = one provider link request + one outbound email. Caller-input
//! errors are reported as-is; every downstream failure is logged here and
//! collapsed into a single internal error so provider detail never reaches
//! the caller.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, instrument};

use crate::config::ResetMailerConfig;
use crate::identity::{ActionCodeSettings, IdentityError, IdentityProvider};
use crate::link::ResetLink;
use crate::smtp::{MailError, MailTransport};
use crate::types::{CallableError, CallableStatus, ResetEmail, ResetResponse};

const EMAIL_REQUIRED: &str = "Email is required.";
const SEND_FAILED: &str = "Failed to send reset email.";

/// What a successful dispatch did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub recipient: String,
    pub link: ResetLink,
}

/// Sends password reset emails
pub struct ResetDispatcher<I, M> {
    identity: I,
    mailer: M,
    from_address: String,
    continue_url: String,
    app_name: String,
    permits: Arc<Semaphore>,
}

impl<I, M> ResetDispatcher<I, M>
where
    I: IdentityProvider,
    M: MailTransport,
{
    pub fn new(config: &ResetMailerConfig, identity: I, mailer: M) -> Self {
        let from_address = if config.from_address.is_empty() {
            config.smtp.user.clone()
        } else {
            config.from_address.clone()
        };

        Self {
            identity,
            mailer,
            from_address,
            continue_url: config.continue_url.clone(),
            app_name: config.app_name.clone(),
            permits: Arc::new(Semaphore::new(config.max_instances.max(1))),
        }
    }

    pub fn identity(&self) -> &I {
        &self.identity
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    /// Remote entry point: `{ email }` in, `{ success: true }` out
    pub async fn send_password_reset_email(
        &self,
        email: Option<&str>,
    ) -> Result<ResetResponse, DispatchError> {
        self.dispatch(email).await.map(|_| ResetResponse::ok())
    }

    /// Same as [`send_password_reset_email`](Self::send_password_reset_email)
    /// but reports which link was mailed
    #[instrument(skip(self, email))]
    pub async fn dispatch(&self, email: Option<&str>) -> Result<DispatchReport, DispatchError> {
        let email = email.unwrap_or_default().trim();
        if email.is_empty() {
            return Err(DispatchError::InvalidArgument(EMAIL_REQUIRED));
        }

        let _permit = self.permits.acquire().await.map_err(|e| {
            error!(error = %e, "Dispatch semaphore closed");
            DispatchError::Internal(SEND_FAILED)
        })?;

        match self.deliver(email).await {
            Ok(link) => {
                info!(rewritten = link.is_rewritten(), "Password reset email sent");
                Ok(DispatchReport {
                    recipient: email.to_string(),
                    link,
                })
            }
            Err(e) => {
                error!(error = %e, "sendPasswordResetEmail failed");
                Err(DispatchError::Internal(SEND_FAILED))
            }
        }
    }

    async fn deliver(&self, email: &str) -> Result<ResetLink, DeliveryFailure> {
        let settings = ActionCodeSettings::in_app(&self.continue_url);
        let provider_link = self
            .identity
            .generate_password_reset_link(email, &settings)
            .await?;

        let link = ResetLink::resolve(&provider_link, &self.continue_url);
        let message = ResetEmail::compose(&self.from_address, email, &self.app_name, link.as_str());
        self.mailer.send(&message).await?;

        Ok(link)
    }
}

/// Downstream failures; logged, never shown to callers
#[derive(Debug, thiserror::Error)]
enum DeliveryFailure {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Errors visible to the caller
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("{0}")]
    InvalidArgument(&'static str),

    #[error("{0}")]
    Internal(&'static str),
}

impl DispatchError {
    pub fn status(&self) -> CallableStatus {
        match self {
            DispatchError::InvalidArgument(_) => CallableStatus::InvalidArgument,
            DispatchError::Internal(_) => CallableStatus::Internal,
        }
    }

    pub fn to_callable(&self) -> CallableError {
        CallableError {
            status: self.status(),
            message: self.to_string(),
        }
    }
}
